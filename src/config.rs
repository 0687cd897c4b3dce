//! Application configuration loaded from environment variables.
//!
//! The gateway is stateless apart from in-memory sessions, so everything
//! it needs is known at startup: where the upstream REST backend and its
//! realtime endpoint live, and a few access-policy knobs.

use std::env;

use crate::services::guard::EmptyPagesPolicy;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the upstream REST backend (e.g. `https://api.example.com`)
    pub upstream_api_url: String,
    /// WebSocket URL of the upstream notification endpoint
    /// (e.g. `wss://api.example.com/notificaciones`)
    pub realtime_url: String,
    /// Frontend URL, used for CORS and cookie attributes
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Where denied requests are redirected the first time
    pub forbidden_path: String,
    /// What a resolved session with zero granted pages may access
    pub empty_pages_policy: EmptyPagesPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            upstream_api_url: env::var("UPSTREAM_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("UPSTREAM_API_URL"))?,
            realtime_url: env::var("REALTIME_URL")
                .map_err(|_| ConfigError::Missing("REALTIME_URL"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            forbidden_path: env::var("FORBIDDEN_PATH")
                .unwrap_or_else(|_| "/forbidden".to_string()),
            empty_pages_policy: parse_empty_pages_policy(
                env::var("EMPTY_PAGES_POLICY").ok().as_deref(),
            )?,
        })
    }

    /// Default config for tests only.
    pub fn test_default() -> Self {
        Self {
            upstream_api_url: "http://upstream.test".to_string(),
            realtime_url: "ws://upstream.test/notificaciones".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            forbidden_path: "/forbidden".to_string(),
            empty_pages_policy: EmptyPagesPolicy::DenyAll,
        }
    }

    /// Whether cookies issued by the gateway should carry the `Secure` flag.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

/// `EMPTY_PAGES_POLICY` is either `deny` (the default) or a fallback route
/// path such as `/inicio` that a page-less session is confined to.
fn parse_empty_pages_policy(raw: Option<&str>) -> Result<EmptyPagesPolicy, ConfigError> {
    match raw {
        None | Some("deny") => Ok(EmptyPagesPolicy::DenyAll),
        Some(path) if path.starts_with('/') => {
            Ok(EmptyPagesPolicy::Fallback(path.to_string()))
        }
        Some(_) => Err(ConfigError::Invalid("EMPTY_PAGES_POLICY")),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
