//! Rephrase proxy error types.
//!
//! Errors fall into two groups:
//!
//! - **Recoverable security blocks** (`BlockedInput`, `BlockedOutput`): raised by the
//!   injection filter or the output validator. The orchestrator recovers from them
//!   per style (or per chunk) and reports a generic message to the client.
//! - **Fatal errors** (`Upstream`, `Network`, ...): end the whole job with a single
//!   error event carrying the error text.

use thiserror::Error;

/// Generic message shown to clients when a security filter blocks content.
///
/// The matched pattern is never included.
pub const SECURITY_BLOCK_MESSAGE: &str =
    "Content blocked due to security concerns. Please try rephrasing your input.";

/// Message emitted when a stream is opened for an unknown request id.
pub const REQUEST_NOT_FOUND: &str = "Request not found";

/// Rephrase proxy errors.
#[derive(Error, Debug)]
pub enum RephraseError {
    /// Unknown request id.
    #[error("Request not found: {0}")]
    NotFound(String),

    /// The injection filter flagged the prompt; no upstream call was made.
    #[error("Input blocked due to security concerns")]
    BlockedInput,

    /// The output validator flagged generated content.
    #[error("Output blocked due to security concerns")]
    BlockedOutput,

    /// The generation provider failed or returned an error status.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Network communication error.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Server-side error.
    #[error("Server error: {0}")]
    Server(String),
}

impl RephraseError {
    /// Whether this error is a security block that callers recover from locally.
    pub fn is_blocked(&self) -> bool {
        matches!(self, RephraseError::BlockedInput | RephraseError::BlockedOutput)
    }
}

/// Result type alias for rephrase operations
pub type Result<T> = std::result::Result<T, RephraseError>;

impl From<reqwest::Error> for RephraseError {
    fn from(err: reqwest::Error) -> Self {
        RephraseError::Network(err.to_string())
    }
}

impl From<toml::de::Error> for RephraseError {
    fn from(err: toml::de::Error) -> Self {
        RephraseError::Config(err.to_string())
    }
}
