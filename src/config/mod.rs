//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`.env` is loaded by the binary)
//! - CLI arguments (for `serve`)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RephraseError, Result};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name reported by the root endpoint
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerSection,

    /// Upstream model API configuration
    #[serde(default)]
    pub upstream: UpstreamSection,

    /// Static frontend configuration
    #[serde(default)]
    pub frontend: FrontendSection,
}

fn default_app_name() -> String {
    "AI Writing Assistant".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            server: ServerSection::default(),
            upstream: UpstreamSection::default(),
            frontend: FrontendSection::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            RephraseError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| RephraseError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Default per-user config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rephrase").join("config.toml"))
    }

    /// Load from `path`, or the default per-user file if present, then overlay
    /// the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(path)?,
                None => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay process environment variables
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Overlay variables from an arbitrary lookup
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Upstream settings
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.upstream.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(model) = lookup("REPHRASE_MODEL") {
            self.upstream.model = model;
        }

        // Server settings
        if let Some(host) = lookup("REPHRASE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("REPHRASE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        // Frontend settings
        if let Some(serve) = lookup("SERVE_FRONTEND") {
            self.frontend.serve = serve.eq_ignore_ascii_case("true");
        }
        if let Some(dir) = lookup("FRONTEND_DIR") {
            self.frontend.dir = PathBuf::from(dir);
        }
    }

    /// Check that the server can start with this configuration
    pub fn validate(&self) -> Result<()> {
        if self.upstream.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(RephraseError::Config(
                "OPENAI_API_KEY environment variable is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allow cross-origin requests
    pub cors: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors: true,
        }
    }
}

impl ServerSection {
    /// Get the full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream model API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSection {
    /// API base URL (e.g., https://api.openai.com/v1)
    pub base_url: String,

    /// Bearer token
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model used for every rewrite
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Static frontend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendSection {
    /// Serve the built frontend as the router fallback
    pub serve: bool,

    /// Directory containing the built frontend
    pub dir: PathBuf,
}

impl Default for FrontendSection {
    fn default() -> Self {
        Self {
            serve: false,
            dir: PathBuf::from("../frontend/dist"),
        }
    }
}
