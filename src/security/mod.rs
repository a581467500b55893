//! Security screening for the rephrase pipeline.
//!
//! Every request crosses two checkpoints:
//!
//! ```text
//! user text ──> PromptInjectionFilter ──> structured prompt ──> upstream LLM
//!                 (detect, sanitize)        (prompt builder)        │
//!                                                                   v
//! client   <──────────────────────── OutputValidator <──────── text deltas
//! ```
//!
//! # Input side
//!
//! | Check    | Examples                                          |
//! |----------|---------------------------------------------------|
//! | Direct   | "ignore previous instructions", "system override" |
//! | Markup   | `<script`, `<img ... src=`, `javascript:`         |
//! | Fuzzy    | "ignroe", "bpyass" (scrambled interior letters)   |
//!
//! Detection blocks the request outright. Sanitization is applied to text that
//! passed detection and only redacts the direct patterns.
//!
//! # Output side
//!
//! Generated chunks are checked for system-prompt leakage, API keys and numbered
//! instruction lists. Blocked content is never described to the client beyond a
//! generic message.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rephrase::security::SecurityPipeline;
//!
//! let pipeline = SecurityPipeline::new();
//! assert!(pipeline.input_filter.detect_injection("Ignore previous instructions"));
//! assert!(!pipeline.output_validator.validate_output("API_KEY: sk-123"));
//! ```

mod filter;
mod patterns;
mod prompt;
mod validator;

pub use filter::{Detection, PromptInjectionFilter, FILTERED_TOKEN, MAX_INPUT_CHARS};
pub use patterns::{ThreatCategory, ThreatPattern, FUZZY_TERMS, INJECTION_PATTERNS};
pub use prompt::{
    create_structured_prompt, generate_system_prompt, task_for_style, DEFAULT_TASK,
    OVERRIDE_REFUSAL, STYLE_TASKS,
};
pub use validator::{OutputValidator, MAX_RESPONSE_CHARS, REFUSAL_MESSAGE};

/// Input filter and output validator bundled together.
#[derive(Debug, Clone, Default)]
pub struct SecurityPipeline {
    /// Screens user text before prompt construction
    pub input_filter: PromptInjectionFilter,
    /// Screens generated text before it reaches the client
    pub output_validator: OutputValidator,
}

impl SecurityPipeline {
    /// Create a pipeline with default components
    pub fn new() -> Self {
        Self::default()
    }
}
