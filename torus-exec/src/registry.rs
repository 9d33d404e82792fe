//! In-memory execution registry.
//!
//! An explicitly owned store mapping execution id to the live execution
//! record, injected into the engine so tests can construct isolated
//! instances. Snapshots go in and out by clone; the pipeline task is the
//! only writer of a record's contents, and a per-execution cancellation
//! token carries the cooperative cancel signal to it.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use torus_domain::Execution;

use crate::error::{ExecError, ExecResult};

struct Entry {
    execution: Execution,
    cancel: CancellationToken,
}

/// Thread-safe registry of tracked executions.
pub struct ExecutionRegistry {
    inner: RwLock<HashMap<String, Entry>>,
}

impl ExecutionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { inner: RwLock::new(HashMap::new()) }
    }

    /// Track a new execution.
    ///
    /// Returns the cancellation token the pipeline must poll at its yield
    /// points.
    ///
    /// # Errors
    /// Returns `ExecError::DuplicateExecution` when the id is already
    /// tracked.
    pub async fn insert(&self, execution: Execution) -> ExecResult<CancellationToken> {
        let mut map = self.inner.write().await;
        if map.contains_key(&execution.execution_id) {
            return Err(ExecError::DuplicateExecution(execution.execution_id));
        }

        let cancel = CancellationToken::new();
        map.insert(
            execution.execution_id.clone(),
            Entry { execution, cancel: cancel.clone() },
        );
        Ok(cancel)
    }

    /// Store a pipeline snapshot, returning the snapshot actually stored.
    ///
    /// If the tracked record was cancelled while the pipeline kept running,
    /// the snapshot adopts the cancellation first: a terminal `Cancelled`
    /// is never overwritten. A snapshot for an id that was purged in the
    /// meantime is returned unchanged and not re-tracked.
    pub async fn save(&self, mut execution: Execution) -> Execution {
        let mut map = self.inner.write().await;
        if let Some(entry) = map.get_mut(&execution.execution_id) {
            execution.adopt_cancellation(&entry.execution);
            entry.execution = execution.clone();
        }
        execution
    }

    /// Snapshot of a tracked execution.
    pub async fn get(&self, execution_id: &str) -> Option<Execution> {
        let map = self.inner.read().await;
        map.get(execution_id).map(|entry| entry.execution.clone())
    }

    /// Cancel a tracked execution.
    ///
    /// Marks the record `Cancelled`, stamps `end_time`, and triggers the
    /// cooperative token. Returns false when the id is unknown or the
    /// execution is already terminal.
    pub async fn cancel(&self, execution_id: &str) -> bool {
        let mut map = self.inner.write().await;
        let Some(entry) = map.get_mut(execution_id) else {
            return false;
        };

        if entry.execution.cancel() {
            entry.cancel.cancel();
            info!(%execution_id, "Execution cancelled");
            true
        } else {
            false
        }
    }

    /// Snapshots of all tracked executions.
    pub async fn list(&self) -> Vec<Execution> {
        let map = self.inner.read().await;
        map.values().map(|entry| entry.execution.clone()).collect()
    }

    /// Purge executions in a terminal state. Returns how many were removed.
    ///
    /// Already-returned snapshots are unaffected; they are copies, not live
    /// references.
    pub async fn cleanup_terminal(&self) -> usize {
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, entry| !entry.execution.status.is_terminal());
        let removed = before - map.len();
        if removed > 0 {
            info!(removed, "Terminal executions cleaned up");
        }
        removed
    }

    /// Number of tracked executions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl Default for ExecutionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
