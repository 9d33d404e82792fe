//! Parse strategy seam.
//!
//! The chain tries strategies in fixed priority order; each one either
//! produces a [`ParsedCommand`] or declines so the next strategy gets the
//! text. Declining is `Ok(None)`, not an error.

use async_trait::async_trait;
use torus_domain::ParsedCommand;

use crate::error::ParseResult;

/// One parsing strategy: attempt to parse, returning a result or declining.
///
/// Implementations:
/// - `DemoStrategy` - deterministic rule-based parsing (no backend needed)
/// - `QuickPatternStrategy` - fast phrase-template path
/// - `SemanticStrategy` - language-understanding service fallback
#[async_trait]
pub trait ParseStrategy: Send + Sync {
    /// Strategy name for logging.
    fn name(&self) -> &'static str;

    /// Attempt to parse `raw_text`.
    ///
    /// Returns `Ok(Some(command))` on a successful parse, `Ok(None)` to
    /// decline, and `Err` only when the strategy's own machinery broke.
    async fn attempt(&self, raw_text: &str) -> ParseResult<Option<ParsedCommand>>;
}
