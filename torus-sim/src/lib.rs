//! Torus Feedback Simulator
//!
//! Demo-mode stand-in for a live device network: a named-value store with
//! first-order convergence of the temperature readback toward its
//! setpoint, a bounded sample history, and a device-port adapter so the
//! execution engine can run against it unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//! use torus_sim::{FeedbackSimulator, SimulatedDevice};
//!
//! let simulator = Arc::new(Mutex::new(FeedbackSimulator::new()));
//! let device = SimulatedDevice::new(simulator.clone());
//!
//! // The transport layer drives ticks at a fixed cadence:
//! simulator.lock().await.tick();
//! ```

#![warn(clippy::all)]

pub mod device;
pub mod simulator;

// Re-exports for convenience
pub use device::SimulatedDevice;
pub use simulator::{
    FeedbackSample, FeedbackSimulator, CONVERGENCE_EPSILON, CONVERGENCE_GAIN, HISTORY_CAP,
};
