//! Simulated device adapter.
//!
//! Implements the device port over a shared [`FeedbackSimulator`], giving
//! demo mode the same interface a live device-network gateway would have.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use torus_domain::{model, targets, ControlOperation, OperationResult, TargetId};
use torus_exec::{standard_limits, DeviceError, DevicePort, SafetyLimit};

use crate::simulator::FeedbackSimulator;

/// Device port backed by the feedback simulator.
pub struct SimulatedDevice {
    simulator: Arc<Mutex<FeedbackSimulator>>,
    limits: HashMap<TargetId, SafetyLimit>,
    setpoint_key: TargetId,
    coil_key: TargetId,
}

impl SimulatedDevice {
    /// Create an adapter over a shared simulator.
    pub fn new(simulator: Arc<Mutex<FeedbackSimulator>>) -> Self {
        Self {
            simulator,
            limits: standard_limits(),
            setpoint_key: TargetId::new(targets::TE_SETPOINT)
                .expect("static target names are valid"),
            coil_key: TargetId::new(targets::COIL_CURRENT)
                .expect("static target names are valid"),
        }
    }

    /// The shared simulator behind this adapter.
    pub fn simulator(&self) -> &Arc<Mutex<FeedbackSimulator>> {
        &self.simulator
    }
}

#[async_trait]
impl DevicePort for SimulatedDevice {
    async fn apply(&self, operation: &ControlOperation) -> Result<OperationResult, DeviceError> {
        if !self.limits.contains_key(&operation.target_id) {
            return Err(DeviceError::UnknownTarget(operation.target_id.to_string()));
        }

        let started = Instant::now();
        let mut simulator = self.simulator.lock().await;

        let previous_value = simulator.get(&operation.target_id).unwrap_or(0.0);
        simulator.set(operation.target_id.clone(), operation.value);

        // A coil-current write implies a commanded temperature: move the
        // setpoint through the inverse actuator model so the readback
        // starts converging toward it.
        if operation.target_id == self.coil_key {
            let implied = model::temperature_for_coil_current(operation.value);
            simulator.set(self.setpoint_key.clone(), implied);
        }

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
        let simulator = self.simulator.lock().await;
        simulator
            .get(target_id)
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

    fn device() -> SimulatedDevice {
        SimulatedDevice::new(Arc::new(Mutex::new(FeedbackSimulator::new())))
    }

    fn coil_operation(value: f64) -> ControlOperation {
        ControlOperation::new(
            TargetId::new(targets::COIL_CURRENT).unwrap(),
            value,
            "A",
            "test",
        )
    }

    #[tokio::test]
    async fn test_apply_records_previous_and_new() {
        let device = device();

        let result = device.apply(&coil_operation(1600.0)).await.unwrap();

        assert!(result.success);
        assert_eq!(result.previous_value, 1200.0);
        assert_eq!(result.new_value, 1600.0);
    }

    #[tokio::test]
    async fn test_coil_write_moves_setpoint() {
        let device = device();

        // 1600 A inverts to 12 keV through the actuator model
        device.apply(&coil_operation(1600.0)).await.unwrap();

        let setpoint = device
            .read(&TargetId::new(targets::TE_SETPOINT).unwrap())
            .await
            .unwrap();
        assert!((setpoint - 12.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_readback_converges_after_command() {
        let device = device();
        device.apply(&coil_operation(1600.0)).await.unwrap();

        {
            let mut simulator = device.simulator().lock().await;
            for _ in 0..200 {
                simulator.tick();
            }
        }

        let readback = device
            .read(&TargetId::new(targets::TE_READBACK).unwrap())
            .await
            .unwrap();
        assert!((readback - 12.0).abs() <= 0.011);
    }

    #[tokio::test]
    async fn test_heater_write_does_not_move_setpoint() {
        let device = device();
        let heater = ControlOperation::new(
            TargetId::new(targets::HEATER_POWER).unwrap(),
            70.0,
            "%",
            "test",
        );

        device.apply(&heater).await.unwrap();

        let setpoint = device
            .read(&TargetId::new(targets::TE_SETPOINT).unwrap())
            .await
            .unwrap();
        assert_eq!(setpoint, 8.0);
    }

    #[tokio::test]
    async fn test_unknown_target_rejected() {
        let device = device();
        let bogus = ControlOperation::new(
            TargetId::new("TOK:NO:SUCH").unwrap(),
            1.0,
            "A",
            "test",
        );

        assert!(matches!(
            device.apply(&bogus).await,
            Err(DeviceError::UnknownTarget(_))
        ));
        assert!(device
            .read(&TargetId::new("TOK:NO:SUCH").unwrap())
            .await
            .is_err());
    }
}
