//! Execution Engine: the step state machine.
//!
//! Sequences one submitted instruction through the pipeline:
//!
//! ```text
//! raw text → parsing → safety_check → execution → monitoring → completion
//! ```
//!
//! Stages 1-3 are fail-fast and terminal; the monitoring stage is
//! best-effort and never changes the overall outcome. Every stage
//! transition is published to the event bus and stored back into the
//! registry so polls see live progress. Cancellation is cooperative:
//! the per-execution token is checked between stages and between
//! monitoring samples, never mid-operation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use torus_domain::{
    targets, Execution, ExecutionStatus, MonitoringSample, StepId,
};
use torus_parser::CommandParser;

use crate::error::{ExecError, ExecResult};
use crate::events::{EventBus, ExecutionEventKind};
use crate::ports::DevicePort;
use crate::registry::ExecutionRegistry;
use crate::safety::SafetyValidator;

// =============================================================================
// Engine Configuration
// =============================================================================

/// Tunable engine parameters.
///
/// The defaults match live operation; tests shrink the monitoring window
/// to keep runs fast.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Total feedback sampling window after dispatch
    pub monitoring_window: Duration,
    /// Cadence between feedback samples
    pub sample_interval: Duration,
    /// How many recent samples the execution record retains
    pub retained_samples: usize,
    /// Fixed target set sampled during monitoring
    pub monitor_targets: Vec<torus_domain::TargetId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monitoring_window: Duration::from_secs(10),
            sample_interval: Duration::from_millis(200),
            retained_samples: 20,
            monitor_targets: targets::monitor_targets(),
        }
    }
}

// =============================================================================
// Execution Engine
// =============================================================================

/// Orchestrates parse → validate → dispatch → monitor → complete.
///
/// The engine owns the execution registry for the lifetime of each record;
/// everything handed outward is a snapshot.
pub struct ExecutionEngine<D: DevicePort> {
    /// Parser chain
    parser: CommandParser,
    /// Device network port
    device: Arc<D>,
    /// Safety validator
    validator: SafetyValidator,
    /// Injected execution store
    registry: Arc<ExecutionRegistry>,
    /// Status notification fan-out
    events: Arc<EventBus>,
    /// Timing and monitoring parameters
    config: EngineConfig,
}

impl<D: DevicePort> ExecutionEngine<D> {
    /// Create a new engine.
    pub fn new(
        parser: CommandParser,
        device: Arc<D>,
        registry: Arc<ExecutionRegistry>,
        events: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            parser,
            device,
            validator: SafetyValidator::new(),
            registry,
            events,
            config,
        }
    }

    /// The execution registry (for inspection).
    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    /// The event bus (for subscribing observers).
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The device port behind this engine.
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Submit a natural-language instruction and drive it to a terminal
    /// state.
    ///
    /// Returns the final execution snapshot. The record stays in the
    /// registry until [`Self::cleanup_terminal`] purges it.
    ///
    /// # Errors
    /// Returns `ExecError::DuplicateExecution` when `execution_id` is
    /// already tracked. Pipeline failures do NOT error here: they are
    /// reported through the returned execution's `Failed` status.
    pub async fn submit(
        &self,
        raw_text: &str,
        execution_id: Option<String>,
    ) -> ExecResult<Execution> {
        let execution_id = execution_id.unwrap_or_else(Execution::generate_id);
        let mut execution = Execution::new(execution_id, raw_text);

        let cancel = self.registry.insert(execution.clone()).await?;
        info!(
            execution_id = %execution.execution_id,
            raw_text,
            "Execution submitted"
        );

        if let Err(e) = self.run_pipeline(&mut execution, &cancel).await {
            execution.fail(e.to_string());
            error!(
                execution_id = %execution.execution_id,
                error = %e,
                "Execution failed"
            );
        }

        execution.finalize();
        let stored = self.registry.save(execution).await;
        self.events.publish(ExecutionEventKind::StatusChanged, &stored);

        Ok(stored)
    }

    /// Snapshot of a tracked execution.
    pub async fn get(&self, execution_id: &str) -> Option<Execution> {
        self.registry.get(execution_id).await
    }

    /// Cancel a tracked execution.
    ///
    /// Cooperative and advisory: the pipeline task notices the signal at
    /// its next yield point. Returns false for unknown or already-terminal
    /// executions.
    pub async fn cancel(&self, execution_id: &str) -> bool {
        let cancelled = self.registry.cancel(execution_id).await;
        if cancelled {
            if let Some(snapshot) = self.registry.get(execution_id).await {
                self.events.publish(ExecutionEventKind::StatusChanged, &snapshot);
            }
        }
        cancelled
    }

    /// Snapshots of every tracked execution.
    pub async fn list_active(&self) -> Vec<Execution> {
        self.registry.list().await
    }

    /// Purge terminal executions from the registry.
    pub async fn cleanup_terminal(&self) -> usize {
        self.registry.cleanup_terminal().await
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    async fn run_pipeline(
        &self,
        execution: &mut Execution,
        cancel: &CancellationToken,
    ) -> ExecResult<()> {
        execution.begin()?;
        self.save_and_publish(execution, ExecutionEventKind::StatusChanged).await;

        // Stage 1: parsing
        self.start_stage(execution, StepId::Parsing).await;
        let parsed = match self.parser.parse(&execution.raw_text).await {
            Ok(parsed) => parsed,
            Err(e) => {
                self.fail_stage(execution, StepId::Parsing, &e.to_string()).await;
                return Err(e.into());
            },
        };
        execution.parsed = Some(parsed.clone());
        let parse_summary = json!({
            "intent": parsed.intent.to_string(),
            "target_value": parsed.target_value,
            "operations": parsed.operations.len(),
        });
        self.complete_stage(execution, StepId::Parsing, parse_summary, 20).await;

        if self.check_cancelled(execution, cancel) {
            return Ok(());
        }

        // Stage 2: safety_check
        self.start_stage(execution, StepId::SafetyCheck).await;
        let report = self.validator.validate(&parsed, self.device.as_ref());
        for warning in &report.warnings {
            warn!(execution_id = %execution.execution_id, warning = %warning, "Safety warning");
        }
        if !report.passed {
            let failed = report
                .checks
                .iter()
                .filter(|check| check.status == crate::safety::CheckStatus::Failed)
                .map(|check| check.target_id.to_string())
                .collect();
            let violation = ExecError::SafetyViolation { failed };
            self.fail_stage(execution, StepId::SafetyCheck, &violation.to_string()).await;
            return Err(violation);
        }
        let report_json = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
        self.complete_stage(execution, StepId::SafetyCheck, report_json, 40).await;

        if self.check_cancelled(execution, cancel) {
            return Ok(());
        }

        // Stage 3: execution (dispatch in list order)
        execution.transition(ExecutionStatus::Executing)?;
        self.start_stage(execution, StepId::Execution).await;
        for operation in &parsed.operations {
            match self.device.apply(operation).await {
                Ok(result) => {
                    debug!(
                        execution_id = %execution.execution_id,
                        target = %result.target_id,
                        previous = result.previous_value,
                        new = result.new_value,
                        "Operation dispatched"
                    );
                    execution.operation_results.push(result);
                },
                Err(e) => {
                    self.fail_stage(execution, StepId::Execution, &e.to_string()).await;
                    return Err(e.into());
                },
            }
        }
        let dispatch_summary = json!({ "dispatched": execution.operation_results.len() });
        self.complete_stage(execution, StepId::Execution, dispatch_summary, 70).await;

        if self.check_cancelled(execution, cancel) {
            return Ok(());
        }

        // Stage 4: monitoring (best-effort, never terminal)
        execution.transition(ExecutionStatus::Monitoring)?;
        self.start_stage(execution, StepId::Monitoring).await;
        match self.monitor(execution, cancel).await {
            Ok(summary) => {
                self.complete_stage(execution, StepId::Monitoring, summary, 90).await;
            },
            Err(e) => {
                warn!(
                    execution_id = %execution.execution_id,
                    error = %e,
                    "Monitoring degraded; completing anyway"
                );
                self.fail_stage(execution, StepId::Monitoring, &e.to_string()).await;
                execution.advance_progress(90);
            },
        }

        if self.check_cancelled(execution, cancel) {
            return Ok(());
        }

        // Stage 5: completion
        execution.transition(ExecutionStatus::Completed)?;
        execution.advance_progress(100);
        self.save_and_publish(execution, ExecutionEventKind::StatusChanged).await;
        info!(execution_id = %execution.execution_id, "Execution completed");

        Ok(())
    }

    /// Sample feedback from the fixed monitor target set for the
    /// configured window, retaining only the most recent samples.
    async fn monitor(
        &self,
        execution: &mut Execution,
        cancel: &CancellationToken,
    ) -> ExecResult<serde_json::Value> {
        // Nothing was dispatched; there is nothing to observe.
        if execution.operation_results.is_empty() {
            return Ok(json!({
                "monitoring_seconds": 0.0,
                "samples_taken": 0,
                "success_rate": 0.0,
            }));
        }

        let started = Instant::now();
        let mut samples_taken = 0usize;

        while started.elapsed() < self.config.monitoring_window {
            if cancel.is_cancelled() {
                break;
            }

            let mut values = BTreeMap::new();
            for target in &self.config.monitor_targets {
                let value = self
                    .device
                    .read(target)
                    .await
                    .map_err(|e| ExecError::MonitoringDegraded(e.to_string()))?;
                values.insert(target.clone(), value);
            }

            execution.record_sample(
                MonitoringSample { timestamp: Utc::now(), values },
                self.config.retained_samples,
            );
            samples_taken += 1;
            self.save_and_publish(execution, ExecutionEventKind::Sample).await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.sample_interval) => {},
                _ = cancel.cancelled() => break,
            }
        }

        Ok(json!({
            "monitoring_seconds": started.elapsed().as_secs_f64(),
            "samples_taken": samples_taken,
            "success_rate": execution.success_rate(),
        }))
    }

    // =========================================================================
    // Stage bookkeeping
    // =========================================================================

    async fn start_stage(&self, execution: &mut Execution, step: StepId) {
        info!(execution_id = %execution.execution_id, step = %step, "Step started");
        execution.start_step(step);
        self.save_and_publish(execution, ExecutionEventKind::StepStarted).await;
    }

    async fn complete_stage(
        &self,
        execution: &mut Execution,
        step: StepId,
        result: serde_json::Value,
        progress: u8,
    ) {
        execution.complete_step(step, result);
        execution.advance_progress(progress);
        info!(execution_id = %execution.execution_id, step = %step, "Step completed");
        self.save_and_publish(execution, ExecutionEventKind::StepCompleted).await;
    }

    async fn fail_stage(&self, execution: &mut Execution, step: StepId, error: &str) {
        execution.fail_step(step, error);
        error!(execution_id = %execution.execution_id, step = %step, error, "Step failed");
        self.save_and_publish(execution, ExecutionEventKind::StepFailed).await;
    }

    /// Store the current snapshot and notify observers.
    ///
    /// The registry merge may hand back an adopted cancellation, which is
    /// copied onto the working record so later stages observe it.
    async fn save_and_publish(&self, execution: &mut Execution, kind: ExecutionEventKind) {
        let stored = self.registry.save(execution.clone()).await;
        execution.adopt_cancellation(&stored);
        self.events.publish(kind, &stored);
    }

    /// Cooperative cancellation check between yield points.
    fn check_cancelled(
        &self,
        execution: &mut Execution,
        cancel: &CancellationToken,
    ) -> bool {
        if !cancel.is_cancelled() && execution.status != ExecutionStatus::Cancelled {
            return false;
        }

        execution.cancel();
        info!(execution_id = %execution.execution_id, "Pipeline observed cancellation");
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubDevice;
    use torus_domain::{Intent, TargetId};
    use torus_parser::CommandParser;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            monitoring_window: Duration::from_millis(200),
            sample_interval: Duration::from_millis(40),
            ..EngineConfig::default()
        }
    }

    fn demo_engine(device: StubDevice) -> ExecutionEngine<StubDevice> {
        ExecutionEngine::new(
            CommandParser::demo(),
            Arc::new(device),
            Arc::new(ExecutionRegistry::new()),
            Arc::new(EventBus::new(256)),
            fast_config(),
        )
    }

    #[tokio::test]
    async fn test_submit_runs_all_stages_to_completion() {
        let engine = demo_engine(StubDevice::new());

        let execution = engine.submit("Set temperature to 12 keV", None).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.progress, 100);
        assert!(execution.start_time.is_some());
        assert!(execution.end_time.is_some());
        assert!(execution.error.is_none());

        let steps: Vec<StepId> = execution.steps.iter().map(|s| s.step_id).collect();
        assert_eq!(
            steps,
            vec![StepId::Parsing, StepId::SafetyCheck, StepId::Execution, StepId::Monitoring]
        );
        assert!(execution.steps.iter().all(|s| s.status == ExecutionStatus::Completed));

        // Demo parse derived two operations, both dispatched
        assert_eq!(execution.operation_results.len(), 2);
        assert!(execution.operation_results.iter().all(|r| r.success));
        assert!(!execution.monitoring_samples.is_empty());

        let parsed = execution.parsed.unwrap();
        assert_eq!(parsed.target_value, Some(12.0));
    }

    #[tokio::test]
    async fn test_dispatch_writes_reach_the_device() {
        let engine = demo_engine(StubDevice::new());
        engine.submit("Set temperature to 12 keV", None).await.unwrap();

        let coil = TargetId::new(targets::COIL_CURRENT).unwrap();
        let heater = TargetId::new(targets::HEATER_POWER).unwrap();
        assert_eq!(engine.device().value(&coil), Some(1600.0));
        assert_eq!(engine.device().value(&heater), Some(70.0));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_100() {
        let engine = demo_engine(StubDevice::new());
        let mut receiver = engine.events().subscribe();

        let execution = engine.submit("raise temperature to 9 keV", None).await.unwrap();
        assert_eq!(execution.progress, 100);

        let mut last = 0u8;
        while let Some(Ok(event)) = receiver.try_recv() {
            assert!(event.execution.progress >= last, "progress regressed");
            last = event.execution.progress;
        }
        assert_eq!(last, 100);
    }

    #[tokio::test]
    async fn test_safety_violation_aborts_before_dispatch() {
        // Demo model: 25 keV -> coil current 2900 A, outside 0..2000
        let engine = demo_engine(StubDevice::new());

        let execution = engine.submit("set temperature to 25 keV", None).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.progress, 100);
        assert!(execution.error.as_deref().unwrap().contains("Safety violation"));

        // Pipeline stopped at safety_check: no dispatch, no monitoring
        let steps: Vec<StepId> = execution.steps.iter().map(|s| s.step_id).collect();
        assert_eq!(steps, vec![StepId::Parsing, StepId::SafetyCheck]);
        assert!(execution.operation_results.is_empty());

        // Nothing was written to the device
        let coil = TargetId::new(targets::COIL_CURRENT).unwrap();
        assert_eq!(engine.device().value(&coil), Some(1200.0));
    }

    #[tokio::test]
    async fn test_dispatch_failure_fails_execution() {
        let device = StubDevice::new();
        device.set_fail_next(true);
        let engine = demo_engine(device);

        let execution = engine.submit("set temperature to 10 keV", None).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error.as_deref().unwrap().contains("Dispatch failure"));

        let last_step = execution.steps.last().unwrap();
        assert_eq!(last_step.step_id, StepId::Execution);
        assert_eq!(last_step.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_monitoring_failure_is_not_terminal() {
        let device = StubDevice::new();
        device.set_fail_reads(true);
        let engine = demo_engine(device);

        let execution = engine.submit("set temperature to 10 keV", None).await.unwrap();

        // Monitoring step failed, but the execution still completed
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.progress, 100);

        let monitoring = execution
            .steps
            .iter()
            .find(|s| s.step_id == StepId::Monitoring)
            .unwrap();
        assert_eq!(monitoring.status, ExecutionStatus::Failed);
        assert!(monitoring.error.is_some());
    }

    #[tokio::test]
    async fn test_monitoring_retains_bounded_samples() {
        let engine = ExecutionEngine::new(
            CommandParser::demo(),
            Arc::new(StubDevice::new()),
            Arc::new(ExecutionRegistry::new()),
            Arc::new(EventBus::new(1024)),
            EngineConfig {
                monitoring_window: Duration::from_millis(300),
                sample_interval: Duration::from_millis(10),
                retained_samples: 5,
                ..EngineConfig::default()
            },
        );

        let execution = engine.submit("set temperature to 10 keV", None).await.unwrap();

        assert!(execution.monitoring_samples.len() <= 5);
        // The monitoring summary counted every sample, not just retained
        let monitoring = execution
            .steps
            .iter()
            .find(|s| s.step_id == StepId::Monitoring)
            .unwrap();
        let taken = monitoring.result.as_ref().unwrap()["samples_taken"].as_u64().unwrap();
        assert!(taken as usize >= execution.monitoring_samples.len());
    }

    #[tokio::test]
    async fn test_unrecognized_command_completes_with_no_operations() {
        // An empty chain declines everything, producing the fallback
        let engine = ExecutionEngine::new(
            CommandParser::from_strategies(vec![]),
            Arc::new(StubDevice::new()),
            Arc::new(ExecutionRegistry::new()),
            Arc::new(EventBus::new(256)),
            fast_config(),
        );

        let execution = engine.submit("do something impossible", None).await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.operation_results.is_empty());
        assert!(execution.monitoring_samples.is_empty());

        let parsed = execution.parsed.unwrap();
        assert_eq!(parsed.intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn test_cancel_during_monitoring_stays_cancelled() {
        let engine = Arc::new(ExecutionEngine::new(
            CommandParser::demo(),
            Arc::new(StubDevice::new()),
            Arc::new(ExecutionRegistry::new()),
            Arc::new(EventBus::new(1024)),
            EngineConfig {
                monitoring_window: Duration::from_secs(5),
                sample_interval: Duration::from_millis(20),
                ..EngineConfig::default()
            },
        ));

        let task_engine = engine.clone();
        let handle = tokio::spawn(async move {
            task_engine
                .submit("set temperature to 10 keV", Some("cmd-cancel-me".to_string()))
                .await
                .unwrap()
        });

        // Let the pipeline reach the monitoring stage, then cancel
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(engine.cancel("cmd-cancel-me").await);

        let execution = handle.await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Cancelled);
        assert_eq!(execution.progress, 100);
        assert!(execution.end_time.is_some());

        // And the registry agrees: never flips back to completed
        let snapshot = engine.get("cmd-cancel-me").await.unwrap();
        assert_eq!(snapshot.status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_unknown_execution_returns_false() {
        let engine = demo_engine(StubDevice::new());
        assert!(!engine.cancel("never-submitted").await);
    }

    #[tokio::test]
    async fn test_duplicate_execution_id_rejected() {
        let engine = demo_engine(StubDevice::new());

        engine
            .submit("set temperature to 10 keV", Some("cmd-dup".to_string()))
            .await
            .unwrap();
        let second = engine
            .submit("set temperature to 11 keV", Some("cmd-dup".to_string()))
            .await;

        assert!(matches!(second, Err(ExecError::DuplicateExecution(_))));
    }

    #[tokio::test]
    async fn test_cleanup_purges_terminal_executions() {
        let engine = demo_engine(StubDevice::new());

        engine.submit("set temperature to 10 keV", Some("cmd-done".to_string())).await.unwrap();
        assert!(engine.get("cmd-done").await.is_some());

        let removed = engine.cleanup_terminal().await;
        assert_eq!(removed, 1);
        assert!(engine.get("cmd-done").await.is_none());
    }

    #[tokio::test]
    async fn test_status_events_published_for_stage_transitions() {
        let engine = demo_engine(StubDevice::new());
        let mut receiver = engine.events().subscribe();

        engine.submit("set temperature to 10 keV", None).await.unwrap();

        let mut kinds = Vec::new();
        while let Some(Ok(event)) = receiver.try_recv() {
            kinds.push(event.kind);
        }

        assert!(kinds.contains(&ExecutionEventKind::StatusChanged));
        assert!(kinds.contains(&ExecutionEventKind::StepStarted));
        assert!(kinds.contains(&ExecutionEventKind::StepCompleted));
        assert!(kinds.contains(&ExecutionEventKind::Sample));
    }
}
