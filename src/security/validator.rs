//! Output validation for generated text.
//!
//! Flags system-prompt leakage, API key exposure and numbered instruction lists
//! before they reach the client.

use tracing::warn;

use super::patterns::{first_match, ThreatPattern, LEAKAGE_REGEX};
use crate::error::{RephraseError, Result};

/// Fixed reply substituted by [`OutputValidator::filter_response`].
pub const REFUSAL_MESSAGE: &str = "I cannot provide that information for security reasons.";

/// Responses longer than this many characters are replaced wholesale.
pub const MAX_RESPONSE_CHARS: usize = 5_000;

/// Validator for generated output.
#[derive(Debug, Clone)]
pub struct OutputValidator {
    max_chars: usize,
}

impl Default for OutputValidator {
    fn default() -> Self {
        Self {
            max_chars: MAX_RESPONSE_CHARS,
        }
    }
}

impl OutputValidator {
    /// Create a validator with the default response limit
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `output` matches none of the leakage patterns.
    pub fn validate_output(&self, output: &str) -> bool {
        self.violation(output).is_none()
    }

    /// The leakage pattern `output` matches, if any. For internal logging only.
    pub fn violation(&self, output: &str) -> Option<&'static ThreatPattern> {
        first_match(&LEAKAGE_REGEX, output)
    }

    /// Check one generated chunk before it is forwarded.
    ///
    /// Fails with [`RephraseError::BlockedOutput`]; the matched pattern is only logged.
    pub fn check_chunk(&self, chunk: &str) -> Result<()> {
        match self.violation(chunk) {
            Some(pattern) => {
                warn!(
                    category = %pattern.category,
                    pattern = pattern.name,
                    "output chunk blocked"
                );
                Err(RephraseError::BlockedOutput)
            },
            None => Ok(()),
        }
    }

    /// Return `response` unchanged if it validates and fits the length limit,
    /// otherwise the fixed refusal.
    ///
    /// The length limit applies even to text that validates.
    pub fn filter_response(&self, response: &str) -> String {
        if !self.validate_output(response) || response.chars().count() > self.max_chars {
            return REFUSAL_MESSAGE.to_string();
        }
        response.to_string()
    }
}
