//! Torus Execution Layer
//!
//! The step state machine that drives a parsed instruction through safety
//! validation, device dispatch, and feedback monitoring.
//!
//! # Architecture
//!
//! ```text
//! raw text → Parser Chain → Safety Validator → Device Port → Monitoring
//!                 ↓               ↓                 ↓            ↓
//!              ExecutionStep records, progress, event bus notifications
//! ```
//!
//! # Components
//!
//! - **Ports**: traits defining the device network interface
//! - **Safety**: static range checks over proposed operation values
//! - **Registry**: injected in-memory execution store with cancellation
//! - **Events**: best-effort status notification fan-out
//! - **Engine**: the five-stage pipeline orchestrator
//! - **Stub**: test implementation of the device port
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use torus_exec::{EngineConfig, EventBus, ExecutionEngine, ExecutionRegistry, StubDevice};
//! use torus_parser::CommandParser;
//!
//! let engine = ExecutionEngine::new(
//!     CommandParser::demo(),
//!     Arc::new(StubDevice::new()),
//!     Arc::new(ExecutionRegistry::new()),
//!     Arc::new(EventBus::default()),
//!     EngineConfig::default(),
//! );
//!
//! let execution = engine.submit("Set temperature to 12 keV", None).await?;
//! assert_eq!(execution.progress, 100);
//! ```

#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod events;
pub mod ports;
pub mod registry;
pub mod safety;
pub mod stub;

// Re-exports for convenience
pub use engine::{EngineConfig, ExecutionEngine};
pub use error::{DeviceError, ExecError, ExecResult};
pub use events::{EventBus, EventReceiver, ExecutionEvent, ExecutionEventKind};
pub use ports::{standard_limits, DevicePort, SafetyLimit};
pub use registry::ExecutionRegistry;
pub use safety::{CheckStatus, SafetyCheck, SafetyReport, SafetyValidator, LONG_DURATION_SECS};
pub use stub::StubDevice;
