//! Client configuration resolved from the command line.

use std::time::Duration;

use thiserror::Error;

/// Default STUN server used when none is given.
pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Backend URL must start with http:// or https://, got {0}")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the relay and message store, e.g. `http://localhost:8000`
    pub backend_url: String,
    /// Room joined at startup
    pub room: String,
    pub name: String,
    /// STUN server; empty disables server reflexive candidates
    pub stun_url: String,
    /// `None` disables reconnecting after a lost signaling channel
    pub reconnect_after: Option<Duration>,
}

impl ClientConfig {
    /// Base URL for the HTTP message store.
    pub fn http_base_url(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }

    /// Base URL for the WebSocket relay (`http` → `ws`, `https` → `wss`).
    pub fn ws_base_url(&self) -> Result<String, ConfigError> {
        let base = self.http_base_url();
        if let Some(rest) = base.strip_prefix("https://") {
            Ok(format!("wss://{rest}"))
        } else if let Some(rest) = base.strip_prefix("http://") {
            Ok(format!("ws://{rest}"))
        } else {
            Err(ConfigError::UnsupportedScheme(self.backend_url.clone()))
        }
    }

    pub fn ice_servers(&self) -> Vec<String> {
        if self.stun_url.trim().is_empty() {
            Vec::new()
        } else {
            vec![self.stun_url.trim().to_string()]
        }
    }
}
