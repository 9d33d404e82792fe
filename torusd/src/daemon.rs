//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Execution Engine (pipeline state machine)
//! - Feedback Simulator (demo device network)
//! - API Server (HTTP + WebSocket endpoints)
//! - Live feed (simulator samples + execution events)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Initialize components (demo or semantic parser chain)
//! 3. Start API server
//! 4. Start simulator tick task and event relay
//! 5. Wait for shutdown signal (SIGINT)
//! 6. Graceful shutdown: stop background tasks

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use torus_exec::{EventBus, ExecutionEngine, ExecutionRegistry};
use torus_parser::CommandParser;
use torus_sim::{FeedbackSimulator, SimulatedDevice};

use crate::api::{create_router, ApiState, FeedFrame};
use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Daemon
// =============================================================================

/// The main Torus daemon, wired to the simulated device network.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Execution engine
    engine: Arc<ExecutionEngine<SimulatedDevice>>,
    /// Shared simulator
    simulator: Arc<Mutex<FeedbackSimulator>>,
    /// Live feed fan-out
    feed: broadcast::Sender<FeedFrame>,
    /// Whether the parser chain runs without a semantic backend
    demo_mode: bool,
    /// Shutdown signal for background tasks
    shutdown: CancellationToken,
}

impl Daemon {
    /// Create a daemon backed by the feedback simulator.
    pub fn new_sim(config: Config) -> Self {
        let simulator = Arc::new(Mutex::new(FeedbackSimulator::new()));
        let device = Arc::new(SimulatedDevice::new(simulator.clone()));

        let (parser, demo_mode) = match &config.semantic {
            Some(semantic) => (CommandParser::production(semantic.clone()), false),
            None => {
                warn!("Semantic backend not configured; running in demo mode");
                (CommandParser::demo(), true)
            },
        };

        let engine = Arc::new(ExecutionEngine::new(
            parser,
            device,
            Arc::new(ExecutionRegistry::new()),
            Arc::new(EventBus::new(1000)),
            config.engine_config(),
        ));

        let (feed, _) = broadcast::channel(1000);

        Self {
            config,
            engine,
            simulator,
            feed,
            demo_mode,
            shutdown: CancellationToken::new(),
        }
    }

    /// The execution engine (for tests and embedding).
    pub fn engine(&self) -> &Arc<ExecutionEngine<SimulatedDevice>> {
        &self.engine
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            demo_mode = self.demo_mode,
            "Starting Torus daemon"
        );

        // 1. Start API server
        let api_addr = self.start_api_server().await?;
        info!(%api_addr, "API server started");

        // 2. Background tasks
        self.spawn_sim_ticker();
        self.spawn_event_relay();

        // 3. Wait for shutdown signal
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to listen for signals: {}", e)))?;
        info!("Received shutdown signal");

        // 4. Graceful shutdown
        self.shutdown.cancel();
        let tracked = self.engine.registry().len().await;
        info!(tracked_executions = tracked, "Shutdown complete");

        Ok(())
    }

    /// Start the API server on the configured address.
    ///
    /// Returns the bound address (useful with port 0 in tests).
    pub async fn start_api_server(&self) -> DaemonResult<SocketAddr> {
        let state = Arc::new(ApiState {
            engine: self.engine.clone(),
            simulator: self.simulator.clone(),
            feed: self.feed.clone(),
            demo_mode: self.demo_mode,
        });

        let router = create_router(state);
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Config(format!("Failed to get local address: {}", e)))?;

        // Spawn the server task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }

    /// Drive the simulator at the configured cadence, broadcasting each
    /// sample on the live feed.
    pub fn spawn_sim_ticker(&self) {
        let simulator = self.simulator.clone();
        let feed = self.feed.clone();
        let shutdown = self.shutdown.clone();
        let tick = self.config.sim_tick;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let sample = simulator.lock().await.tick();
                        // Nobody listening is fine
                        let _ = feed.send(FeedFrame::Sample { sample });
                    }
                    _ = shutdown.cancelled() => {
                        info!("Simulator ticker stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Relay engine events onto the live feed.
    pub fn spawn_event_relay(&self) {
        let mut receiver = self.engine.events().subscribe();
        let feed = self.feed.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = receiver.recv() => {
                        match event {
                            Some(Ok(event)) => {
                                let _ = feed.send(FeedFrame::Execution {
                                    kind: event.kind,
                                    execution: event.execution,
                                });
                            }
                            Some(Err(lag_msg)) => {
                                warn!(%lag_msg, "Event relay lagged");
                            }
                            None => break,
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
