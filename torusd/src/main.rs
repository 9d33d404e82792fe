//! Torus Daemon
//!
//! Runtime orchestrator for the natural-language device control pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration (demo mode)
//! cargo run -p torusd
//!
//! # Start with custom environment
//! TORUS_ENV=test TORUS_API_PORT=8081 cargo run -p torusd
//! ```
//!
//! # Environment Variables
//!
//! - `TORUS_ENV`: Environment (test, development, production)
//! - `TORUS_API_HOST`: API host (default: 0.0.0.0)
//! - `TORUS_API_PORT`: API port (default: 8080)
//! - `TORUS_SEMANTIC_API_KEY`: semantic backend key (absent = demo mode)
//! - `TORUS_SEMANTIC_BASE_URL`: semantic backend URL
//! - `TORUS_SEMANTIC_MODEL`: semantic model name
//! - `TORUS_MONITORING_WINDOW_SECS`: feedback window (default: 10)
//! - `TORUS_SAMPLE_INTERVAL_MS`: sample cadence (default: 200)
//! - `TORUS_SIM_TICK_MS`: simulator tick cadence (default: 500)

use torusd::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("torusd=info".parse()?))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        "Torus Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::new_sim(config);
    daemon.run().await?;

    Ok(())
}
