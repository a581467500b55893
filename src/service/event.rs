//! Server-push events emitted by a rephrase stream.

use serde::{Deserialize, Serialize};

use crate::error::{REQUEST_NOT_FOUND, SECURITY_BLOCK_MESSAGE};

/// One event of a rephrase stream, serialized as `{"type": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RephraseEvent {
    /// Incremental text for a style
    Delta {
        /// Style tag
        style: String,
        /// Text chunk
        text: String,
    },
    /// A style finished
    Complete {
        /// Style tag
        style: String,
    },
    /// All styles finished
    End,
    /// Style-level security block or job-level failure
    Error {
        /// Style tag, for style-level errors
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<String>,
        /// Client-facing text, for style-level errors
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Error message, for job-level errors
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl RephraseEvent {
    /// Delta event
    pub fn delta(style: impl Into<String>, text: impl Into<String>) -> Self {
        RephraseEvent::Delta {
            style: style.into(),
            text: text.into(),
        }
    }

    /// Completion event for a style
    pub fn complete(style: impl Into<String>) -> Self {
        RephraseEvent::Complete {
            style: style.into(),
        }
    }

    /// Generic security block for a style
    pub fn blocked(style: impl Into<String>) -> Self {
        RephraseEvent::Error {
            style: Some(style.into()),
            text: Some(SECURITY_BLOCK_MESSAGE.to_string()),
            message: None,
        }
    }

    /// Job-level failure
    pub fn failure(message: impl Into<String>) -> Self {
        RephraseEvent::Error {
            style: None,
            text: None,
            message: Some(message.into()),
        }
    }

    /// Unknown request id
    pub fn not_found() -> Self {
        Self::failure(REQUEST_NOT_FOUND)
    }

    /// True for error events
    pub fn is_error(&self) -> bool {
        matches!(self, RephraseEvent::Error { .. })
    }

    /// JSON payload
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// `data: <JSON>\n\n` frame
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}
