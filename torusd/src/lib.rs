//! Torus Daemon Library
//!
//! Runtime orchestrator for the natural-language device control pipeline.
//!
//! # Architecture
//!
//! ```text
//! HTTP / WebSocket → API → Execution Engine → Parser Chain
//!                              ↓                    ↓
//!                        Device Port ←── Feedback Simulator (demo)
//!                              ↓
//!                        Live feed (samples, execution events)
//! ```
//!
//! # Components
//!
//! - **Daemon**: main runtime orchestrator
//! - **API**: HTTP endpoints + WebSocket live feed
//! - **Config**: environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use torusd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_sim(config);
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;

// Re-exports for convenience
pub use api::{ApiState, FeedFrame};
pub use config::{ApiConfig, Config, EngineSettings, Environment};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
