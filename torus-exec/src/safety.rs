//! Safety validation of parsed commands.
//!
//! Static range checks over proposed operation values against the limit
//! table owned by the device interface. Value checks are blocking: the
//! engine must not dispatch when any check fails. The long-duration check
//! is advisory only and lands in `warnings`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use torus_domain::{ParsedCommand, TargetId};

use crate::ports::DevicePort;

/// Duration above which a command draws an advisory warning (seconds).
pub const LONG_DURATION_SECS: f64 = 60.0;

/// Outcome of one limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    /// Value is inside the target's limits
    Passed,
    /// Value is outside the limits, or the target is unknown
    Failed,
}

/// One per-operation limit check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheck {
    /// Target the operation writes
    pub target_id: TargetId,
    /// Proposed value
    pub value: f64,
    /// Check outcome
    pub status: CheckStatus,
}

/// Full validation result for a parsed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyReport {
    /// False iff any operation failed its limit check
    pub passed: bool,
    /// One check per operation, in operation order
    pub checks: Vec<SafetyCheck>,
    /// Advisory warnings; never affect `passed`
    pub warnings: Vec<String>,
}

/// Validates parsed commands against the device limit table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SafetyValidator;

impl SafetyValidator {
    /// Create a validator.
    pub fn new() -> Self {
        Self
    }

    /// Check every operation value against its target's limits.
    ///
    /// An operation whose target is missing from the limit table fails its
    /// check: an unknown target cannot be proven safe.
    pub fn validate<D: DevicePort + ?Sized>(
        &self,
        command: &ParsedCommand,
        device: &D,
    ) -> SafetyReport {
        let mut checks = Vec::with_capacity(command.operations.len());
        let mut passed = true;

        for operation in &command.operations {
            let status = match device.limits(&operation.target_id) {
                Some(limit) if limit.contains(operation.value) => CheckStatus::Passed,
                _ => CheckStatus::Failed,
            };

            if status == CheckStatus::Failed {
                passed = false;
            }

            debug!(
                target = %operation.target_id,
                value = operation.value,
                ?status,
                "Safety limit check"
            );

            checks.push(SafetyCheck {
                target_id: operation.target_id.clone(),
                value: operation.value,
                status,
            });
        }

        let mut warnings = Vec::new();
        if let Some(duration) = command.duration_seconds {
            if duration > LONG_DURATION_SECS {
                warnings.push("Long-duration control request - caution required".to_string());
            }
        }

        SafetyReport { passed, checks, warnings }
    }
}

// =============================================================================
// Tests
// =============================================================================
