//! Well-known control and monitor points in the device network.
//!
//! These are the channel names the rule-based parser strategies emit and
//! the execution engine monitors. The semantic parsing service may return
//! additional targets; the safety validator rejects anything outside the
//! device interface's limit table.

use crate::value_objects::TargetId;

/// Plasma temperature setpoint (keV)
pub const TE_SETPOINT: &str = "TOK:PCS:TE:SP";
/// Plasma temperature readback (keV)
pub const TE_READBACK: &str = "TOK:PCS:TE:RBV";
/// Toroidal field coil current (A)
pub const COIL_CURRENT: &str = "TOK:COIL:CURR";
/// Ohmic heater power (%)
pub const HEATER_POWER: &str = "TOK:HEATER:POW";
/// Gas injection flow (sccm)
pub const GAS_FLOW: &str = "TOK:GAS:FLOW";
/// Toroidal magnetic field (T)
pub const TOROIDAL_FIELD: &str = "TOK:MAGNET:BT";

/// The fixed target set sampled during the monitoring stage.
pub fn monitor_targets() -> Vec<TargetId> {
    [TE_SETPOINT, TE_READBACK, COIL_CURRENT, HEATER_POWER]
        .iter()
        .map(|name| TargetId::new(*name).expect("static target names are valid"))
        .collect()
}
