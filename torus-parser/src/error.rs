//! Parser layer error types.

use thiserror::Error;

/// Errors that can escape the parser chain.
///
/// A command that merely cannot be understood is NOT an error: the chain
/// returns the fallback command for it. `ParseError` means a strategy's own
/// machinery broke, which aborts the execution pipeline.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A strategy's internal state was broken (bug, not bad input)
    #[error("Parser internal error: {0}")]
    Internal(String),
}

/// Result type for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors from the semantic parsing service.
///
/// These never cross the crate boundary: the semantic strategy absorbs
/// every variant into the fallback command.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("Service request failed: {0}")]
    Request(String),

    /// Non-success HTTP status from the service
    #[error("Service returned status {0}")]
    Status(u16),

    /// Response body was not the expected JSON shape
    #[error("Service response was not valid JSON: {0}")]
    InvalidJson(String),

    /// Response was JSON but missing a required field
    #[error("Service response missing field: {0}")]
    MissingField(&'static str),

    /// Response parsed but violated the command schema
    #[error("Service response violated the command schema: {0}")]
    Schema(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Request(err.to_string())
    }
}
