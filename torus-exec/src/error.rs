//! Execution layer error types.

use thiserror::Error;
use torus_domain::DomainError;
use torus_parser::ParseError;

/// Errors from the device network boundary.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    /// Target id is not a known control or monitor point
    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    /// Device network is unreachable
    #[error("Device network disconnected: {0}")]
    Disconnected(String),

    /// The device rejected the write
    #[error("Write rejected for {target}: {reason}")]
    Rejected {
        /// Target that rejected the write
        target: String,
        /// Device-reported reason
        reason: String,
    },
}

/// Errors that can occur during execution operations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Parser machinery broke (not an unrecognized command)
    #[error("Parse failure: {0}")]
    Parse(#[from] ParseError),

    /// Safety limit check failed; dispatch must not proceed
    #[error("Safety violation: limit check failed for {}", .failed.join(", "))]
    SafetyViolation {
        /// Targets whose values fell outside their limits
        failed: Vec<String>,
    },

    /// Device write failed during dispatch
    #[error("Dispatch failure: {0}")]
    Dispatch(#[from] DeviceError),

    /// Feedback sampling broke; recorded on the step, never terminal
    #[error("Monitoring degraded: {0}")]
    MonitoringDegraded(String),

    /// No execution tracked under this id
    #[error("Execution not found: {0}")]
    NotFound(String),

    /// An execution with this id is already tracked
    #[error("Execution already exists: {0}")]
    DuplicateExecution(String),

    /// Domain invariant violation
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
