//! Event bus for execution status notification.
//!
//! Observers (API layer, live feeds, loggers) subscribe and receive an
//! execution snapshot on every stage transition. Delivery is best-effort:
//! a lagging or dropped subscriber never aborts the pipeline.
//!
//! Uses tokio broadcast channels for fan-out to multiple receivers.

use serde::Serialize;
use tokio::sync::broadcast;

use torus_domain::Execution;

// =============================================================================
// Event Types
// =============================================================================

/// What kind of transition an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEventKind {
    /// Overall execution status changed
    StatusChanged,
    /// A pipeline stage started
    StepStarted,
    /// A pipeline stage completed
    StepCompleted,
    /// A pipeline stage failed
    StepFailed,
    /// A feedback sample was recorded during monitoring
    Sample,
}

/// One notification: the transition kind plus a full execution snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEvent {
    /// Transition kind
    pub kind: ExecutionEventKind,
    /// Execution snapshot at the time of the transition
    pub execution: Execution,
}

// =============================================================================
// Event Bus
// =============================================================================

/// Best-effort fan-out of execution events.
///
/// Multiple producers can publish, and multiple consumers can receive.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity.
    ///
    /// Capacity determines how many events can be buffered before slow
    /// receivers start missing events (lagging).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event snapshot to all subscribers.
    ///
    /// Returns the number of receivers that got the event; 0 when nobody
    /// is listening, which is not an error.
    pub fn publish(&self, kind: ExecutionEventKind, execution: &Execution) -> usize {
        let event = ExecutionEvent { kind, execution: execution.clone() };
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver { receiver: self.sender.subscribe() }
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Receiver for execution events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<ExecutionEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` if the sender has been dropped.
    /// Returns an error description if the receiver lagged (missed events).
    pub async fn recv(&mut self) -> Option<Result<ExecutionEvent, String>> {
        match self.receiver.recv().await {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            },
        }
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is immediately available.
    pub fn try_recv(&mut self) -> Option<Result<ExecutionEvent, String>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Closed) => None,
            Err(broadcast::error::TryRecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
