//! Completion provider: screened prompt construction and per-request stream handles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CompletionBackend, EventStream, UpstreamEvent, UpstreamHandle};
use crate::error::{RephraseError, Result};
use crate::security::{
    create_structured_prompt, generate_system_prompt, task_for_style, PromptInjectionFilter,
};

/// Role the model is given in every system prompt.
pub const WRITING_ROLE: &str = "a writing assistant";

/// Screen `text` and build the structured prompt sent upstream for `style`.
///
/// Fails with [`RephraseError::BlockedInput`] if the injection filter flags the text.
pub fn build_rephrase_prompt(
    filter: &PromptInjectionFilter,
    text: &str,
    style: &str,
) -> Result<String> {
    if let Some(detection) = filter.inspect(text) {
        warn!(
            style,
            category = %detection.category,
            pattern = %detection.name,
            "input blocked by injection filter"
        );
        return Err(RephraseError::BlockedInput);
    }

    let clean_input = filter.sanitize_input(text);
    let task = task_for_style(style);
    let system_prompt = generate_system_prompt(
        WRITING_ROLE,
        &format!(
            "to {task} while preserving the original meaning. You should only output the rewritten text, nothing else."
        ),
    );

    Ok(create_structured_prompt(
        &system_prompt,
        &format!("{task}: {clean_input}"),
    ))
}

/// Registered upstream work for one request id
struct ActiveStream {
    /// Distinguishes successive registrations under the same id
    generation: u64,
    /// Ends the [`CompletionStream`] handed to the caller
    token: CancellationToken,
    /// Backend close hook, `None` while the upstream call is still opening
    upstream: Option<Arc<dyn UpstreamHandle>>,
}

/// Upstream events for one request, ending early once its handle is closed.
pub struct CompletionStream {
    events: EventStream,
    token: CancellationToken,
}

impl CompletionStream {
    /// Next upstream event, or `None` when exhausted or closed.
    pub async fn next_event(&mut self) -> Option<Result<UpstreamEvent>> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            event = self.events.next() => event,
        }
    }

    /// Whether the handle for this stream was closed from outside.
    pub fn was_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Wraps an upstream backend with input screening and cancellable stream tracking.
///
/// At most one handle is registered per request id. The id is registered before the
/// backend call is awaited, so a close that lands while the upstream is still
/// opening is honored as soon as it opens. Closing is safe to repeat and to race
/// with the stream's own cleanup: whichever call removes the entry closes it.
pub struct CompletionProvider {
    backend: Arc<dyn CompletionBackend>,
    input_filter: PromptInjectionFilter,
    active: RwLock<HashMap<String, ActiveStream>>,
    generation: AtomicU64,
}

impl CompletionProvider {
    /// Create a provider over `backend` with the default input filter
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            input_filter: PromptInjectionFilter::new(),
            active: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Replace the input filter
    pub fn with_input_filter(mut self, filter: PromptInjectionFilter) -> Self {
        self.input_filter = filter;
        self
    }

    /// Screen the prompt, register `request_id` and open one upstream stream for it.
    ///
    /// If the id is closed while the backend call is in flight, the upstream is
    /// closed as soon as it opens and the returned stream is already ended.
    pub async fn create_completion_stream(
        &self,
        request_id: &str,
        prompt_text: &str,
        style: &str,
        model: &str,
    ) -> Result<CompletionStream> {
        let prompt = build_rephrase_prompt(&self.input_filter, prompt_text, style)?;

        debug!(
            request_id,
            style,
            model,
            backend = self.backend.name(),
            prompt_chars = prompt.chars().count(),
            "opening upstream stream"
        );

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let previous = self.write().insert(
            request_id.to_string(),
            ActiveStream {
                generation,
                token: token.clone(),
                upstream: None,
            },
        );
        if let Some(previous) = previous {
            warn!(request_id, "replacing an upstream stream that was still registered");
            Self::shutdown(request_id, previous);
        }

        let upstream = match self.backend.open_stream(model, &prompt).await {
            Ok(upstream) => upstream,
            Err(e) => {
                self.release(request_id, generation);
                return Err(e);
            },
        };

        let attached = match self.write().get_mut(request_id) {
            Some(entry) if entry.generation == generation => {
                entry.upstream = Some(Arc::clone(&upstream.handle));
                true
            },
            _ => false,
        };

        if !attached {
            info!(request_id, "stream closed while opening, closing upstream");
            token.cancel();
            if let Err(e) = upstream.handle.close() {
                warn!(request_id, error = %e, "error closing upstream stream");
            }
        }

        Ok(CompletionStream {
            events: upstream.events,
            token,
        })
    }

    /// Close and unregister the handle for `request_id`.
    ///
    /// Returns `false` if nothing was registered or the close failed. The entry is
    /// removed in both cases. A registration whose upstream is still opening counts
    /// as closed once its token is cancelled.
    pub fn close_stream(&self, request_id: &str) -> bool {
        let entry = self.write().remove(request_id);

        match entry {
            Some(active) => Self::shutdown(request_id, active),
            None => false,
        }
    }

    /// Whether a handle is registered for `request_id`
    pub fn is_active(&self, request_id: &str) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(request_id)
    }

    /// Number of registered handles
    pub fn active_count(&self) -> usize {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ActiveStream>> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop a registration whose upstream never opened
    fn release(&self, request_id: &str, generation: u64) {
        let mut active = self.write();
        if active
            .get(request_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            active.remove(request_id);
        }
    }

    fn shutdown(request_id: &str, active: ActiveStream) -> bool {
        active.token.cancel();
        let Some(upstream) = active.upstream else {
            info!(request_id, "upstream stream cancelled while opening");
            return true;
        };
        match upstream.close() {
            Ok(()) => {
                info!(request_id, "upstream stream closed");
                true
            },
            Err(e) => {
                warn!(request_id, error = %e, "error closing upstream stream");
                false
            },
        }
    }
}
