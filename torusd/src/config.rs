//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.
//! The semantic backend is optional: without `TORUS_SEMANTIC_API_KEY` the
//! daemon runs in demo mode with rule-based parsing and the simulated
//! device network.

use std::env;
use std::time::Duration;

use torus_exec::EngineConfig;
use torus_parser::SemanticConfig;

use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Execution engine timing
    pub engine: EngineSettings,

    /// Semantic parsing backend; `None` enables demo mode
    pub semantic: Option<SemanticConfig>,

    /// Simulator tick cadence
    pub sim_tick: Duration,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Execution engine timing settings.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Feedback sampling window after dispatch
    pub monitoring_window: Duration,
    /// Cadence between feedback samples
    pub sample_interval: Duration,
    /// Samples retained on the execution record
    pub retained_samples: usize,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (short timings, ephemeral port)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = Self::load_api_config()?;
        let engine = Self::load_engine_settings()?;
        let semantic = Self::load_semantic_config();
        let sim_tick = Duration::from_millis(Self::load_u64_env("TORUS_SIM_TICK_MS", 500)?);

        Ok(Self { api, engine, semantic, sim_tick, environment })
    }

    /// Create test configuration with short timings.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            engine: EngineSettings {
                monitoring_window: Duration::from_millis(300),
                sample_interval: Duration::from_millis(50),
                retained_samples: 20,
            },
            semantic: None,
            sim_tick: Duration::from_millis(20),
            environment: Environment::Test,
        }
    }

    /// Engine configuration derived from these settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            monitoring_window: self.engine.monitoring_window,
            sample_interval: self.engine.sample_interval,
            retained_samples: self.engine.retained_samples,
            ..EngineConfig::default()
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("TORUS_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid TORUS_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("TORUS_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port_str = env::var("TORUS_API_PORT").unwrap_or_else(|_| "8080".to_string());

        let port = port_str
            .parse::<u16>()
            .map_err(|_| DaemonError::Config(format!("Invalid TORUS_API_PORT: {}", port_str)))?;

        Ok(ApiConfig { host, port })
    }

    fn load_engine_settings() -> DaemonResult<EngineSettings> {
        let window_secs = Self::load_u64_env("TORUS_MONITORING_WINDOW_SECS", 10)?;
        let interval_ms = Self::load_u64_env("TORUS_SAMPLE_INTERVAL_MS", 200)?;
        let retained = Self::load_u64_env("TORUS_RETAINED_SAMPLES", 20)?;

        Ok(EngineSettings {
            monitoring_window: Duration::from_secs(window_secs),
            sample_interval: Duration::from_millis(interval_ms),
            retained_samples: retained as usize,
        })
    }

    /// Semantic backend is configured iff an API key is present.
    fn load_semantic_config() -> Option<SemanticConfig> {
        let api_key = env::var("TORUS_SEMANTIC_API_KEY").ok()?;

        Some(SemanticConfig {
            base_url: env::var("TORUS_SEMANTIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key,
            model: env::var("TORUS_SEMANTIC_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        })
    }

    fn load_u64_env(key: &str, default: u64) -> DaemonResult<u64> {
        match env::var(key) {
            Ok(val) => val
                .parse::<u64>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig { host: "0.0.0.0".to_string(), port: 8080 },
            engine: EngineSettings {
                monitoring_window: Duration::from_secs(10),
                sample_interval: Duration::from_millis(200),
                retained_samples: 20,
            },
            semantic: None,
            sim_tick: Duration::from_millis(500),
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
