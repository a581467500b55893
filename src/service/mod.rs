//! Rephrase request lifecycle.
//!
//! A client creates a job with a text and a list of styles, then opens an event
//! stream for it. Each style is rewritten by the upstream model in order and its
//! chunks are validated before being forwarded:
//!
//! ```text
//! data: {"type":"delta","style":"casual","text":"Hey"}
//! data: {"type":"complete","style":"casual"}
//! data: {"type":"error","style":"polite","text":"Content blocked due to ..."}
//! data: {"type":"end"}
//! ```
//!
//! A blocked style only produces an error event for that style; an upstream
//! failure ends the job with `{"type":"error","message":...}`.

mod event;
mod rephrase;
mod stats;
mod store;

pub use event::RephraseEvent;
pub use rephrase::{RephraseService, StyleAttempt};
pub use stats::{ServiceStats, StatsSummary};
pub use store::{InMemoryStore, Job, JobStatus, RequestStore};
