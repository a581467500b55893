//! Upstream completion layer.
//!
//! The [`CompletionProvider`] sits between the orchestrator and an opaque
//! text-generation backend. It screens the prompt, builds the structured prompt,
//! opens one upstream stream per request id and keeps a cancellable handle for it.
//!
//! # Architecture
//!
//! ```text
//! RephraseService ──> CompletionProvider ──> dyn CompletionBackend ──> LLM API
//!                          │                     (OpenAiBackend)
//!                          │
//!                          └── active handles: request_id -> ActiveStream
//!                                 (closed by stream cleanup or by cancel)
//! ```
//!
//! # Backends
//!
//! | Backend          | Upstream                         |
//! |------------------|----------------------------------|
//! | `OpenAiBackend`  | `POST {base_url}/responses` (SSE) |
//!
//! Tests plug in scripted backends through the same trait.

mod openai;
mod provider;
mod sse;

pub use openai::OpenAiBackend;
pub use provider::{build_rephrase_prompt, CompletionProvider, CompletionStream, WRITING_ROLE};
pub use sse::{SseDecoder, SseEvent};

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Event type carrying an incremental text delta.
pub const TEXT_DELTA_EVENT: &str = "response.output_text.delta";

/// One event from the upstream generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEvent {
    /// Event type discriminator
    pub kind: String,
    /// Incremental text, for text-producing events
    pub delta: Option<String>,
}

impl UpstreamEvent {
    /// Text delta event
    pub fn text_delta(text: impl Into<String>) -> Self {
        Self {
            kind: TEXT_DELTA_EVENT.to_string(),
            delta: Some(text.into()),
        }
    }

    /// Event without text (lifecycle markers and the like)
    pub fn other(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            delta: None,
        }
    }

    /// The delta text if this is a text delta event
    pub fn as_text_delta(&self) -> Option<&str> {
        if self.kind == TEXT_DELTA_EVENT {
            self.delta.as_deref()
        } else {
            None
        }
    }
}

/// Stream of upstream events.
pub type EventStream = BoxStream<'static, Result<UpstreamEvent>>;

/// Close hook for an open upstream generation.
pub trait UpstreamHandle: Send + Sync {
    /// Stop the upstream generation. May fail; callers drop the handle either way.
    fn close(&self) -> Result<()>;
}

impl UpstreamHandle for CancellationToken {
    fn close(&self) -> Result<()> {
        self.cancel();
        Ok(())
    }
}

/// An open upstream generation: its events and the handle that stops it.
pub struct UpstreamStream {
    /// Incremental events
    pub events: EventStream,
    /// Close hook
    pub handle: Arc<dyn UpstreamHandle>,
}

/// Text-generation provider contract.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Start a streaming generation for a single user-role message.
    async fn open_stream(&self, model: &str, prompt: &str) -> Result<UpstreamStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_delta_accessor() {
        assert_eq!(UpstreamEvent::text_delta("hi").as_text_delta(), Some("hi"));
        assert_eq!(UpstreamEvent::other("response.created").as_text_delta(), None);

        let odd = UpstreamEvent {
            kind: "response.refusal.delta".to_string(),
            delta: Some("no".to_string()),
        };
        assert_eq!(odd.as_text_delta(), None);
    }

    #[test]
    fn test_token_handle_cancels() {
        let token = CancellationToken::new();
        token.close().unwrap();
        assert!(token.is_cancelled());
    }
}
