//! Server state.

use tokio_util::sync::CancellationToken;

use crate::service::RephraseService;

/// Application state shared across handlers
pub struct AppState {
    /// Name reported by the root endpoint
    pub app_name: String,
    /// Rephrase orchestrator
    pub service: RephraseService,
    /// Fires on server shutdown; every event stream holds a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create new application state
    pub fn new(app_name: impl Into<String>, service: RephraseService) -> Self {
        Self {
            app_name: app_name.into(),
            service,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token for one event stream, cancelled with the server
    pub fn stream_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
