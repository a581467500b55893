//! OpenAI Responses API backend.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::sse::{SseDecoder, SseEvent};
use super::{CompletionBackend, UpstreamEvent, UpstreamStream};
use crate::config::UpstreamSection;
use crate::error::{RephraseError, Result};

/// Streaming client for `POST {base_url}/responses`.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiBackend {
    /// Create a backend from the upstream config section
    pub fn new(config: &UpstreamSection) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RephraseError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url)
    }
}

/// Request body for a single user-role message.
fn request_body(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "input": [{"role": "user", "content": prompt}],
        "stream": true,
    })
}

/// Map one decoded JSON payload to an upstream event.
///
/// `error` and `response.failed` payloads become errors.
fn decode_payload(value: &Value) -> Result<UpstreamEvent> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if kind == "error" || kind == "response.failed" {
        let message = value
            .get("message")
            .or_else(|| value.pointer("/response/error/message"))
            .and_then(Value::as_str)
            .unwrap_or("generation failed");
        return Err(RephraseError::Upstream(message.to_string()));
    }

    Ok(UpstreamEvent {
        kind,
        delta: value.get("delta").and_then(Value::as_str).map(String::from),
    })
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn open_stream(&self, model: &str, prompt: &str) -> Result<UpstreamStream> {
        let mut request = self
            .client
            .post(self.endpoint())
            .header(header::ACCEPT, "text/event-stream")
            .json(&request_body(model, prompt));

        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("Failed to read upstream error body: {}", e);
                    String::new()
                },
            };
            return Err(RephraseError::Upstream(format!("{status}: {body}")));
        }

        tracing::debug!(model, "upstream stream opened");

        let token = CancellationToken::new();
        let abort = token.clone();
        let mut body = response.bytes_stream();

        let events = stream! {
            let mut decoder = SseDecoder::new();
            'read: loop {
                let chunk = tokio::select! {
                    biased;
                    () = abort.cancelled() => break 'read,
                    chunk = body.next() => chunk,
                };

                let finished = chunk.is_none();
                let decoded = match chunk {
                    Some(Ok(bytes)) => decoder.push(&bytes),
                    Some(Err(e)) => Err(RephraseError::from(e)),
                    None => decoder.finish().map(|tail| tail.into_iter().collect()),
                };

                match decoded {
                    Ok(sse_events) => {
                        for sse in sse_events {
                            match sse {
                                SseEvent::Data(value) => {
                                    let event = decode_payload(&value);
                                    let failed = event.is_err();
                                    yield event;
                                    if failed {
                                        break 'read;
                                    }
                                },
                                SseEvent::Done => break 'read,
                                SseEvent::Comment(_) => {},
                                SseEvent::Error(message) => {
                                    yield Err(RephraseError::Upstream(message));
                                    break 'read;
                                },
                            }
                        }
                    },
                    Err(e) => {
                        yield Err(e);
                        break 'read;
                    },
                }

                if finished {
                    break 'read;
                }
            }
        };

        Ok(UpstreamStream {
            events: events.boxed(),
            handle: Arc::new(token),
        })
    }
}
