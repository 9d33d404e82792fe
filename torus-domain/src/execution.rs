//! Execution lifecycle types.
//!
//! An [`Execution`] tracks one submitted instruction through the pipeline:
//! parsing, safety validation, dispatch, monitoring, completion. The
//! execution engine is the only writer; everything handed outward is a
//! snapshot clone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::value_objects::{DomainError, ParsedCommand, TargetId};

// =============================================================================
// Execution Status
// =============================================================================

/// Lifecycle status of an execution (and of its individual steps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, pipeline not started
    Pending,
    /// Parsing the natural-language text
    Parsing,
    /// Dispatching control operations
    Executing,
    /// Sampling feedback after dispatch
    Monitoring,
    /// Terminal: pipeline finished successfully
    Completed,
    /// Terminal: a fatal stage failed
    Failed,
    /// Terminal: cancelled by the caller
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Parsing => "parsing",
            ExecutionStatus::Executing => "executing",
            ExecutionStatus::Monitoring => "monitoring",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Execution Steps
// =============================================================================

/// Identifies one pipeline stage. Exactly one step per stage per execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    /// Natural-language parsing
    Parsing,
    /// Safety limit validation
    SafetyCheck,
    /// Device control dispatch
    Execution,
    /// Feedback monitoring
    Monitoring,
}

impl StepId {
    /// Human-readable step name shown to operators.
    pub fn name(&self) -> &'static str {
        match self {
            StepId::Parsing => "Natural language command parsing",
            StepId::SafetyCheck => "Safety validation",
            StepId::Execution => "Device control dispatch",
            StepId::Monitoring => "Result monitoring",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepId::Parsing => "parsing",
            StepId::SafetyCheck => "safety_check",
            StepId::Execution => "execution",
            StepId::Monitoring => "monitoring",
        };
        write!(f, "{}", name)
    }
}

/// Record of one pipeline stage: timestamps, outcome, and result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Which stage this step records
    pub step_id: StepId,
    /// Human-readable step name
    pub name: String,
    /// Step status: `Pending` while running, then `Completed` or `Failed`
    pub status: ExecutionStatus,
    /// When the stage started
    pub start_time: DateTime<Utc>,
    /// When the stage finished (success or failure)
    pub end_time: Option<DateTime<Utc>>,
    /// Stage duration in seconds
    pub duration_seconds: Option<f64>,
    /// Stage result payload (stage-specific JSON)
    pub result: Option<serde_json::Value>,
    /// Error message when the stage failed
    pub error: Option<String>,
}

impl ExecutionStep {
    /// Start a step record for a stage.
    pub fn started(step_id: StepId) -> Self {
        Self {
            step_id,
            name: step_id.name().to_string(),
            status: ExecutionStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            duration_seconds: None,
            result: None,
            error: None,
        }
    }

    fn stamp_end(&mut self) {
        let end = Utc::now();
        self.duration_seconds =
            Some((end - self.start_time).num_milliseconds() as f64 / 1000.0);
        self.end_time = Some(end);
    }

    /// Mark the step completed with its result payload.
    pub fn complete(&mut self, result: serde_json::Value) {
        self.status = ExecutionStatus::Completed;
        self.result = Some(result);
        self.stamp_end();
    }

    /// Mark the step failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.stamp_end();
    }
}

// =============================================================================
// Operation Result
// =============================================================================

/// Outcome of dispatching one control operation to the device network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Control point that was written
    pub target_id: TargetId,
    /// Value the operation requested
    pub requested_value: f64,
    /// Engineering unit
    pub unit: String,
    /// Whether the write was accepted
    pub success: bool,
    /// Value before the write
    pub previous_value: f64,
    /// Value after the write
    pub new_value: f64,
    /// Wall-clock time the write took, in seconds
    pub elapsed_seconds: f64,
}

// =============================================================================
// Monitoring Sample
// =============================================================================

/// One feedback sample taken during the monitoring stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSample {
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
    /// Sampled values by target
    pub values: BTreeMap<TargetId, f64>,
}

// =============================================================================
// Execution
// =============================================================================

/// One submitted instruction and its full pipeline history.
///
/// Owned exclusively by the execution engine for its lifetime; snapshots
/// handed to callers are clones and never change afterwards.
///
/// # Invariants
/// - `progress` is monotonically non-decreasing
/// - once `status` is terminal it never transitions again
/// - `steps` are appended in pipeline order, never reordered or removed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Unique execution identifier
    pub execution_id: String,
    /// The raw instruction as submitted
    pub raw_text: String,
    /// Parser output, present after the parsing stage succeeds
    pub parsed: Option<ParsedCommand>,
    /// Current lifecycle status
    pub status: ExecutionStatus,
    /// When the pipeline started
    pub start_time: Option<DateTime<Utc>>,
    /// When the pipeline finished (stamped on every exit path)
    pub end_time: Option<DateTime<Utc>>,
    /// One step record per completed-or-failed stage, in pipeline order
    pub steps: Vec<ExecutionStep>,
    /// One result per dispatched operation, in dispatch order
    pub operation_results: Vec<OperationResult>,
    /// Pipeline progress, 0..=100, monotonic
    pub progress: u8,
    /// Most recent feedback samples (bounded; oldest dropped first)
    pub monitoring_samples: Vec<MonitoringSample>,
    /// Error message when the execution failed
    pub error: Option<String>,
}

impl Execution {
    /// Create a pending execution for a raw instruction.
    pub fn new(execution_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            raw_text: raw_text.into(),
            parsed: None,
            status: ExecutionStatus::Pending,
            start_time: None,
            end_time: None,
            steps: Vec::new(),
            operation_results: Vec::new(),
            progress: 0,
            monitoring_samples: Vec::new(),
            error: None,
        }
    }

    /// Generate a time-ordered execution id.
    pub fn generate_id() -> String {
        format!("cmd-{}", Uuid::now_v7())
    }

    /// Transition to a new status.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidStateTransition` when the execution is
    /// already in a terminal status.
    pub fn transition(&mut self, status: ExecutionStatus) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition(format!(
                "{} is terminal, cannot transition to {}",
                self.status, status
            )));
        }
        self.status = status;
        Ok(())
    }

    /// Raise progress to `value`. Progress never decreases.
    pub fn advance_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(100));
    }

    /// Start the pipeline: stamp `start_time` and move to `Parsing`.
    pub fn begin(&mut self) -> Result<(), DomainError> {
        self.start_time = Some(Utc::now());
        self.transition(ExecutionStatus::Parsing)
    }

    /// Append a step record for a stage and return its index.
    pub fn start_step(&mut self, step_id: StepId) -> usize {
        self.steps.push(ExecutionStep::started(step_id));
        self.steps.len() - 1
    }

    /// Complete the most recent step for `step_id`.
    pub fn complete_step(&mut self, step_id: StepId, result: serde_json::Value) {
        if let Some(step) = self.steps.iter_mut().rev().find(|s| s.step_id == step_id) {
            step.complete(result);
        }
    }

    /// Fail the most recent step for `step_id`.
    pub fn fail_step(&mut self, step_id: StepId, error: impl Into<String>) {
        if let Some(step) = self.steps.iter_mut().rev().find(|s| s.step_id == step_id) {
            step.fail(error);
        }
    }

    /// Record a feedback sample, keeping only the `cap` most recent.
    pub fn record_sample(&mut self, sample: MonitoringSample, cap: usize) {
        self.monitoring_samples.push(sample);
        if self.monitoring_samples.len() > cap {
            let drop = self.monitoring_samples.len() - cap;
            self.monitoring_samples.drain(..drop);
        }
    }

    /// Mark the execution failed with a human-readable message.
    ///
    /// A no-op when the execution is already terminal (a cancellation is
    /// never downgraded to a failure).
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Failed;
        self.error = Some(message.into());
    }

    /// Mark the execution cancelled. Returns false if already terminal.
    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = ExecutionStatus::Cancelled;
        self.end_time = Some(Utc::now());
        true
    }

    /// Stamp the exit of the pipeline: `end_time` is set if missing and
    /// progress is forced to 100 regardless of outcome.
    pub fn finalize(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
        self.advance_progress(100);
    }

    /// If `stored` was cancelled while this copy kept running, adopt the
    /// cancellation so the terminal status is never overwritten.
    pub fn adopt_cancellation(&mut self, stored: &Execution) {
        if stored.status == ExecutionStatus::Cancelled
            && self.status != ExecutionStatus::Cancelled
        {
            self.status = ExecutionStatus::Cancelled;
            if let Some(end) = stored.end_time {
                self.end_time = Some(end);
            }
        }
    }

    /// Fraction of dispatched operations that succeeded, in 0.0..=1.0.
    pub fn success_rate(&self) -> f64 {
        if self.operation_results.is_empty() {
            return 0.0;
        }
        let successful = self.operation_results.iter().filter(|r| r.success).count();
        successful as f64 / self.operation_results.len() as f64
    }
}

// =============================================================================
// Tests
// =============================================================================
