//! Rephrase HTTP server.
//!
//! Exposes the rephrase lifecycle over HTTP:
//! - `POST /v1/rephrase` creates a job
//! - `GET /v1/rephrase/stream?request_id=..` streams its events (SSE)
//! - `DELETE /v1/rephrase/:request_id` cancels it
//!
//! Plus `/`, `/health`, `/stats` and, optionally, the built frontend as fallback.
//!
//! # Example
//!
//! ```rust,ignore
//! use rephrase::{Config, server::RephraseServer};
//!
//! let config = Config::load(None)?;
//! let server = RephraseServer::new(config)?;
//! server.run().await?;
//! ```

mod handlers;
mod state;

pub use handlers::{create_router, health_check, RephraseRequest, RephraseResponse, StreamParams};
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{RephraseError, Result};
use crate::llm::{CompletionBackend, CompletionProvider, OpenAiBackend};
use crate::security::SecurityPipeline;
use crate::service::{InMemoryStore, RephraseService};

/// Rephrase HTTP server
pub struct RephraseServer {
    config: Config,
    state: Arc<AppState>,
}

impl RephraseServer {
    /// Create a server talking to the configured OpenAI-compatible upstream
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let backend = OpenAiBackend::new(&config.upstream)?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Create a server over an arbitrary completion backend
    pub fn with_backend(config: Config, backend: Arc<dyn CompletionBackend>) -> Self {
        let security = SecurityPipeline::new();
        let provider = CompletionProvider::new(backend).with_input_filter(security.input_filter);
        let service = RephraseService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(provider),
            config.upstream.model.clone(),
        )
        .with_validator(security.output_validator);
        let state = Arc::new(AppState::new(config.app_name.clone(), service));

        Self { config, state }
    }

    /// Shared state
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Get the router with middleware and the optional frontend fallback
    pub fn router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        let frontend = &self.config.frontend;
        if frontend.serve {
            if frontend.dir.is_dir() {
                tracing::info!("Serving frontend from {}", frontend.dir.display());
                router = router.fallback_service(ServeDir::new(&frontend.dir));
            } else {
                tracing::warn!(
                    "Frontend directory {} not found, not serving static files",
                    frontend.dir.display()
                );
            }
        }

        if self.config.server.cors {
            router = router.layer(CorsLayer::permissive());
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Run until Ctrl-C or [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.server.listen_addr();
        let router = self.router();

        tracing::info!("{} starting...", self.config.app_name);
        tracing::info!("Upstream: {}", self.config.upstream.base_url);
        tracing::info!("Model: {}", self.config.upstream.model);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RephraseError::Server(format!("Failed to bind to {addr}: {e}")))?;
        tracing::info!("Listening on http://{}", addr);

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Shutdown signal received");
                        shutdown.cancel();
                    },
                    () = shutdown.cancelled() => {},
                }
            })
            .await
            .map_err(|e| RephraseError::Server(format!("Server error: {e}")))?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Stop the server and end every open event stream
    pub fn shutdown(&self) {
        self.state.shutdown.cancel();
    }
}
