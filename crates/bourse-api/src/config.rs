//! HTTP API configuration.

use serde::{Deserialize, Serialize};

/// A session token accepted by [`StaticSessions`](crate::auth::StaticSessions).
#[derive(Clone, Serialize, Deserialize)]
pub struct StaticSession {
    pub token: String,
    pub account_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl std::fmt::Debug for StaticSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSession")
            .field("token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Enable the HTTP server.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow cross-origin requests from any origin.
    #[serde(default)]
    pub cors_permissive: bool,
    /// Session tokens mapped to accounts.
    #[serde(default)]
    pub sessions: Vec<StaticSession>,
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_port(),
            cors_permissive: false,
            sessions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: ApiConfig = serde_json::from_str("{}").unwrap();
        assert!(config.enabled);
        assert_eq!(config.port, 8080);
        assert!(config.sessions.is_empty());
    }

    #[test]
    fn test_session_debug_hides_token() {
        let session = StaticSession {
            token: "s3cret".to_string(),
            account_id: "alice".to_string(),
            display_name: None,
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("alice"));
    }
}
