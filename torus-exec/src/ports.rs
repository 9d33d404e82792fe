//! Execution layer port definitions.
//!
//! Ports define the interfaces for external services (device network).
//! Adapters implement these ports for specific backends (simulator, stub,
//! a real channel-access gateway).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use torus_domain::{targets, ControlOperation, OperationResult, TargetId};

use crate::error::DeviceError;

// =============================================================================
// Safety Limits
// =============================================================================

/// Static write limits for one target, in its engineering unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyLimit {
    /// Lowest permitted value (inclusive)
    pub low: f64,
    /// Highest permitted value (inclusive)
    pub high: f64,
}

impl SafetyLimit {
    /// Create a limit range.
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Whether a value falls inside the limit range.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// The standard per-target limit table for the tokamak control points.
///
/// Owned by the device interface; the safety validator consults it through
/// [`DevicePort::limits`].
pub fn standard_limits() -> HashMap<TargetId, SafetyLimit> {
    let entries = [
        (targets::COIL_CURRENT, SafetyLimit::new(0.0, 2000.0)),
        (targets::HEATER_POWER, SafetyLimit::new(0.0, 100.0)),
        (targets::GAS_FLOW, SafetyLimit::new(0.0, 1000.0)),
        (targets::TOROIDAL_FIELD, SafetyLimit::new(0.0, 3.5)),
        (targets::TE_SETPOINT, SafetyLimit::new(0.0, 30.0)),
        (targets::TE_READBACK, SafetyLimit::new(0.0, 30.0)),
    ];

    entries
        .iter()
        .map(|(name, limit)| {
            (TargetId::new(*name).expect("static target names are valid"), *limit)
        })
        .collect()
}

// =============================================================================
// Device Port
// =============================================================================

/// Port for device network operations (reads and writes of named values).
///
/// Implementations:
/// - `StubDevice` - for testing (immediate writes to an in-memory map)
/// - `SimulatedDevice` - demo mode, backed by the feedback simulator
#[async_trait]
pub trait DevicePort: Send + Sync {
    /// Apply one control operation to the device network.
    ///
    /// # Arguments
    ///
    /// * `operation` - The write to perform
    ///
    /// # Returns
    ///
    /// `OperationResult` with previous/new values on success; fails with
    /// `DeviceError` on an unreachable or invalid target.
    async fn apply(&self, operation: &ControlOperation) -> Result<OperationResult, DeviceError>;

    /// Read the current value of a target.
    ///
    /// # Arguments
    ///
    /// * `target_id` - Control or monitor point to read
    ///
    /// # Returns
    ///
    /// Current value in engineering units; fails with `DeviceError` when
    /// disconnected or the target is unknown.
    async fn read(&self, target_id: &TargetId) -> Result<f64, DeviceError>;

    /// Static write limits for a target.
    ///
    /// Returns `None` for targets not in the limit table; the safety
    /// validator treats those as failed checks.
    fn limits(&self, target_id: &TargetId) -> Option<SafetyLimit>;

    /// Check if the device network is healthy/connected.
    async fn health_check(&self) -> Result<(), DeviceError>;
}

// =============================================================================
// Tests
// =============================================================================
