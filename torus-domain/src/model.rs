//! Empirical actuator model constants.
//!
//! These map a temperature delta to coil current and heater power. They are
//! operational placeholder formulas, not physical law; downstream code
//! treats them as fixed constants so that rule-based parsing stays a pure
//! function of the input text.

/// Assumed plasma temperature when no readback is consulted (keV).
pub const REFERENCE_TEMP_KEV: f64 = 8.0;

/// Coil current at the reference temperature (A).
pub const BASE_COIL_CURRENT: f64 = 1200.0;
/// Coil current slope (A per keV of temperature delta).
pub const COIL_CURRENT_PER_KEV: f64 = 100.0;

/// Heater power at the reference temperature (%).
pub const BASE_HEATER_POWER: f64 = 50.0;
/// Heater power slope (% per keV of temperature delta).
pub const HEATER_POWER_PER_KEV: f64 = 5.0;

/// Coil current for a target temperature, anchored at the reference.
pub fn coil_current_for(target_kev: f64) -> f64 {
    BASE_COIL_CURRENT + (target_kev - REFERENCE_TEMP_KEV) * COIL_CURRENT_PER_KEV
}

/// Heater power for a target temperature, anchored at the reference.
pub fn heater_power_for(target_kev: f64) -> f64 {
    BASE_HEATER_POWER + (target_kev - REFERENCE_TEMP_KEV) * HEATER_POWER_PER_KEV
}

/// Invert [`coil_current_for`]: the temperature a coil current implies.
pub fn temperature_for_coil_current(coil_current: f64) -> f64 {
    REFERENCE_TEMP_KEV + (coil_current - BASE_COIL_CURRENT) / COIL_CURRENT_PER_KEV
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_model_at_12_kev() {
        assert_eq!(coil_current_for(12.0), 1600.0);
        assert_eq!(heater_power_for(12.0), 70.0);
    }

    #[test]
    fn test_affine_model_at_default_target() {
        assert_eq!(coil_current_for(10.0), 1400.0);
        assert_eq!(heater_power_for(10.0), 60.0);
    }

    #[test]
    fn test_inverse_recovers_temperature() {
        let coil = coil_current_for(11.5);
        assert!((temperature_for_coil_current(coil) - 11.5).abs() < 1e-12);
    }
}
