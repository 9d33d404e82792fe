//! The parser chain.
//!
//! An explicit ordered list of strategies, each offered the raw text in
//! turn until one accepts. The priority order and decline semantics are
//! testable in isolation; the chain itself never raises for well-formed
//! input.

use tracing::debug;

use torus_domain::ParsedCommand;

use crate::demo::DemoStrategy;
use crate::error::ParseResult;
use crate::quick::QuickPatternStrategy;
use crate::semantic::{SemanticConfig, SemanticStrategy};
use crate::strategy::ParseStrategy;

/// Translates raw instruction text into a [`ParsedCommand`] by trying
/// strategies in fixed priority order.
pub struct CommandParser {
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl CommandParser {
    /// Demo-mode chain: deterministic rule-based parsing only.
    ///
    /// Used when no semantic backend is configured.
    pub fn demo() -> Self {
        Self { strategies: vec![Box::new(DemoStrategy::new())] }
    }

    /// Production chain: quick phrase templates first, semantic service as
    /// the fallback.
    pub fn production(semantic: SemanticConfig) -> Self {
        Self {
            strategies: vec![
                Box::new(QuickPatternStrategy::new()),
                Box::new(SemanticStrategy::new(semantic)),
            ],
        }
    }

    /// Build a chain from an explicit strategy list (mainly for tests).
    pub fn from_strategies(strategies: Vec<Box<dyn ParseStrategy>>) -> Self {
        Self { strategies }
    }

    /// Whether this chain runs without a semantic backend.
    pub fn is_demo(&self) -> bool {
        self.strategies.len() == 1 && self.strategies[0].name() == "demo"
    }

    /// Parse raw text into a structured command.
    ///
    /// Strategies are tried in order; the first that accepts wins. If every
    /// strategy declines, the fallback command is returned: an unrecognized
    /// instruction is a degraded result, not an error.
    ///
    /// # Errors
    /// Only when a strategy's internal machinery breaks.
    pub async fn parse(&self, raw_text: &str) -> ParseResult<ParsedCommand> {
        for strategy in &self.strategies {
            if let Some(command) = strategy.attempt(raw_text).await? {
                debug!(
                    strategy = strategy.name(),
                    intent = %command.intent,
                    operations = command.operations.len(),
                    "Command parsed"
                );
                return Ok(command);
            }
            debug!(strategy = strategy.name(), "Strategy declined");
        }

        Ok(ParsedCommand::fallback(raw_text))
    }
}

// =============================================================================
// Tests
// =============================================================================
