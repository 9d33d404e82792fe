//! Stub device implementation for testing.
//!
//! Simulates device network behavior without any I/O: writes land in an
//! in-memory map, reads come straight back out, and failures can be
//! injected per call.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use torus_domain::{targets, ControlOperation, OperationResult, TargetId};

use crate::error::DeviceError;
use crate::ports::{standard_limits, DevicePort, SafetyLimit};

/// Stub device network for testing.
///
/// Writes are accepted immediately for any target in the limit table.
pub struct StubDevice {
    /// Current values by target name
    values: RwLock<HashMap<TargetId, f64>>,
    /// Static limit table
    limits: HashMap<TargetId, SafetyLimit>,
    /// Whether to fail the next write
    fail_next: RwLock<bool>,
    /// Whether reads should fail (simulates a dropped monitor link)
    fail_reads: RwLock<bool>,
}

impl StubDevice {
    /// Create a stub seeded with nominal plasma values.
    pub fn new() -> Self {
        let mut values = HashMap::new();
        let seed = [
            (targets::TE_SETPOINT, 8.0),
            (targets::TE_READBACK, 8.0),
            (targets::COIL_CURRENT, 1200.0),
            (targets::HEATER_POWER, 50.0),
        ];
        for (name, value) in seed {
            values.insert(
                TargetId::new(name).expect("static target names are valid"),
                value,
            );
        }

        Self {
            values: RwLock::new(values),
            limits: standard_limits(),
            fail_next: RwLock::new(false),
            fail_reads: RwLock::new(false),
        }
    }

    /// Create a stub with a custom limit table.
    pub fn with_limits(limits: HashMap<TargetId, SafetyLimit>) -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            limits,
            fail_next: RwLock::new(false),
            fail_reads: RwLock::new(false),
        }
    }

    /// Set the stored value for a target.
    pub fn set_value(&self, target_id: &TargetId, value: f64) {
        let mut values = self.values.write().unwrap();
        values.insert(target_id.clone(), value);
    }

    /// Read the stored value for a target, if any.
    pub fn value(&self, target_id: &TargetId) -> Option<f64> {
        let values = self.values.read().unwrap();
        values.get(target_id).copied()
    }

    /// Configure the next write to fail.
    pub fn set_fail_next(&self, fail: bool) {
        let mut fail_next = self.fail_next.write().unwrap();
        *fail_next = fail;
    }

    /// Configure all reads to fail until switched back.
    pub fn set_fail_reads(&self, fail: bool) {
        let mut fail_reads = self.fail_reads.write().unwrap();
        *fail_reads = fail;
    }

    /// Check and reset the fail-next switch.
    fn should_fail(&self) -> bool {
        let mut fail_next = self.fail_next.write().unwrap();
        let fail = *fail_next;
        *fail_next = false;
        fail
    }
}

impl Default for StubDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DevicePort for StubDevice {
    async fn apply(&self, operation: &ControlOperation) -> Result<OperationResult, DeviceError> {
        if self.should_fail() {
            return Err(DeviceError::Disconnected("Simulated device failure".to_string()));
        }

        if !self.limits.contains_key(&operation.target_id) {
            return Err(DeviceError::UnknownTarget(operation.target_id.to_string()));
        }

        let started = Instant::now();
        let previous_value = {
            let mut values = self.values.write().unwrap();
            let previous = values.get(&operation.target_id).copied().unwrap_or(0.0);
            values.insert(operation.target_id.clone(), operation.value);
            previous
        };

        Ok(OperationResult {
            target_id: operation.target_id.clone(),
            requested_value: operation.value,
            unit: operation.unit.clone(),
            success: true,
            previous_value,
            new_value: operation.value,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        })
    }

    async fn read(&self, target_id: &TargetId) -> Result<f64, DeviceError> {
        if *self.fail_reads.read().unwrap() {
            return Err(DeviceError::Disconnected("Simulated monitor link failure".to_string()));
        }

        let values = self.values.read().unwrap();
        values
            .get(target_id)
            .copied()
            .ok_or_else(|| DeviceError::UnknownTarget(target_id.to_string()))
    }

    fn limits(&self, target_id: &TargetId) -> Option<SafetyLimit> {
        self.limits.get(target_id).copied()
    }

    async fn health_check(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn coil() -> TargetId {
        TargetId::new(targets::COIL_CURRENT).unwrap()
    }

    #[tokio::test]
    async fn test_apply_records_previous_and_new() {
        let device = StubDevice::new();
        let operation = ControlOperation::new(coil(), 1600.0, "A", "test");

        let result = device.apply(&operation).await.unwrap();

        assert!(result.success);
        assert_eq!(result.previous_value, 1200.0);
        assert_eq!(result.new_value, 1600.0);
        assert_eq!(device.value(&coil()), Some(1600.0));
    }

    #[tokio::test]
    async fn test_apply_unknown_target_fails() {
        let device = StubDevice::new();
        let operation = ControlOperation::new(
            TargetId::new("TOK:NO:SUCH").unwrap(),
            1.0,
            "A",
            "test",
        );

        let result = device.apply(&operation).await;
        assert!(matches!(result, Err(DeviceError::UnknownTarget(_))));
    }

    #[tokio::test]
    async fn test_fail_next_applies_once() {
        let device = StubDevice::new();
        let operation = ControlOperation::new(coil(), 1600.0, "A", "test");

        device.set_fail_next(true);
        assert!(device.apply(&operation).await.is_err());
        assert!(device.apply(&operation).await.is_ok());
    }

    #[tokio::test]
    async fn test_read_seeded_values() {
        let device = StubDevice::new();
        let readback = TargetId::new(targets::TE_READBACK).unwrap();
        assert_eq!(device.read(&readback).await.unwrap(), 8.0);
    }

    #[tokio::test]
    async fn test_fail_reads_is_sticky() {
        let device = StubDevice::new();
        let readback = TargetId::new(targets::TE_READBACK).unwrap();

        device.set_fail_reads(true);
        assert!(device.read(&readback).await.is_err());
        assert!(device.read(&readback).await.is_err());

        device.set_fail_reads(false);
        assert!(device.read(&readback).await.is_ok());
    }
}
