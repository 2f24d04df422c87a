//! Configuration module for the BOCH dashboard.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::policy::{PolicyConfig, PolicyError};

use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// RapidAPI key; empty means the dashboard stays disconnected
    pub api_key: String,
    /// Base URL of the BOCH API (default: "https://boch.p.rapidapi.com")
    pub api_base_url: String,
    /// Value of the `X-RapidAPI-Host` header (default: "boch.p.rapidapi.com")
    pub api_host: String,
    /// Seconds between automatic refreshes (default: 60)
    pub refresh_secs: u64,
    /// Per-request timeout in seconds (default: 10)
    pub request_timeout_secs: u64,
    /// Optional JSON policy file
    pub policy_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            api_key: String::new(),
            api_base_url: "https://boch.p.rapidapi.com".to_string(),
            api_host: "boch.p.rapidapi.com".to_string(),
            refresh_secs: 60,
            request_timeout_secs: 10,
            policy_path: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BOCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `BOCH_API_KEY`: RapidAPI key (default: empty)
    /// - `BOCH_API_BASE_URL`: API base URL
    /// - `BOCH_API_HOST`: RapidAPI host header
    /// - `BOCH_REFRESH_SECS`: refresh interval (default: 60)
    /// - `BOCH_REQUEST_TIMEOUT_SECS`: request timeout (default: 10)
    /// - `BOCH_POLICY_PATH`: policy file path (default: built-in policy)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = lookup("BOCH_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(key) = lookup("BOCH_API_KEY") {
            cfg.api_key = key.trim().to_string();
        }

        if let Some(url) = lookup("BOCH_API_BASE_URL").filter(|s| !s.trim().is_empty()) {
            cfg.api_base_url = url;
        }

        if let Some(host) = lookup("BOCH_API_HOST").filter(|s| !s.trim().is_empty()) {
            cfg.api_host = host;
        }

        if let Some(secs) = lookup("BOCH_REFRESH_SECS").and_then(|s| s.parse().ok()) {
            if secs > 0 {
                cfg.refresh_secs = secs;
            }
        }

        if let Some(secs) = lookup("BOCH_REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            if secs > 0 {
                cfg.request_timeout_secs = secs;
            }
        }

        cfg.policy_path = lookup("BOCH_POLICY_PATH").filter(|s| !s.trim().is_empty());

        cfg
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load and validate the status policy.
    ///
    /// Falls back to the built-in policy when no file is configured.
    pub fn load_policy(&self) -> Result<PolicyConfig, PolicyError> {
        let policy = match &self.policy_path {
            Some(path) => {
                tracing::info!("Loading status policy from {}", path);
                PolicyConfig::from_file(path)?
            }
            None => PolicyConfig::default(),
        };
        policy.validate()?;
        policy.warn_overlaps();
        Ok(policy)
    }
}
