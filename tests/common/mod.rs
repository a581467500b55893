//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use futures::{stream, StreamExt};
use rephrase::error::{RephraseError, Result};
use rephrase::llm::{CompletionBackend, UpstreamEvent, UpstreamHandle, UpstreamStream};
use rephrase::service::{InMemoryStore, RephraseService};
use rephrase::CompletionProvider;

/// What one upstream call plays back.
pub enum Script {
    /// Emit the events, then end
    Events(Vec<Result<UpstreamEvent>>),
    /// Emit the events, then stay open until closed
    HoldOpen(Vec<Result<UpstreamEvent>>),
    /// Wait for the gate before opening, then emit the events
    Gated(Arc<Notify>, Vec<Result<UpstreamEvent>>),
    /// Fail to open
    Fail(String),
}

impl Script {
    /// Successful stream of text deltas
    pub fn deltas(chunks: &[&str]) -> Self {
        Script::Events(chunks.iter().map(|c| Ok(UpstreamEvent::text_delta(*c))).collect())
    }

    /// Open-ended stream of text deltas
    pub fn held(chunks: &[&str]) -> Self {
        Script::HoldOpen(chunks.iter().map(|c| Ok(UpstreamEvent::text_delta(*c))).collect())
    }
}

/// Upstream handle counting close calls.
pub struct CountingHandle {
    closes: Arc<AtomicUsize>,
    fail: bool,
}

impl UpstreamHandle for CountingHandle {
    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(RephraseError::Upstream("close failed".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Backend playing back one [`Script`] per call, in order.
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    prompts: Mutex<Vec<String>>,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

impl ScriptedBackend {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            prompts: Mutex::new(Vec::new()),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_close: false,
        }
    }

    /// Every close call on this backend's handles fails
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Close calls made on handles from this backend
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn open_stream(&self, _model: &str, prompt: &str) -> Result<UpstreamStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Events(Vec::new()));

        let events = match script {
            Script::Events(events) => stream::iter(events).boxed(),
            Script::HoldOpen(events) => stream::iter(events).chain(stream::pending()).boxed(),
            Script::Gated(gate, events) => {
                gate.notified().await;
                stream::iter(events).boxed()
            },
            Script::Fail(message) => return Err(RephraseError::Upstream(message)),
        };

        Ok(UpstreamStream {
            events,
            handle: Arc::new(CountingHandle {
                closes: Arc::clone(&self.closes),
                fail: self.fail_close,
            }),
        })
    }
}

/// Service over a fresh store and the given backend.
pub fn service_with(backend: Arc<ScriptedBackend>) -> RephraseService {
    let provider = CompletionProvider::new(backend);
    RephraseService::new(Arc::new(InMemoryStore::new()), Arc::new(provider), "test-model")
}

pub fn styles(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}
