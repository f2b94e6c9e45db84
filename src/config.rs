//! Registry client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::time::Duration;

use crate::error::RegistryError;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// How long a user-facing error stays visible before clearing itself.
pub const ERROR_DISPLAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for RegistryTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub base_url: String,
    pub session_token: Option<String>,
    pub timeouts: RegistryTimeouts,
}

impl RegistryConfig {
    /// Build typed registry config from environment variables.
    ///
    /// Optional:
    /// - `SYMBOLS_API_BASE_URL`: default `http://127.0.0.1:3000/api`
    /// - `SYMBOLS_SESSION_TOKEN`: sent as the `session_token` cookie
    /// - `SYMBOLS_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SYMBOLS_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ConfigParse`] if the base URL is blank.
    pub fn from_env() -> Result<Self, RegistryError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RegistryConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ConfigParse`] if the base URL is blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RegistryError> {
        let base_url = lookup("SYMBOLS_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        let session_token = lookup("SYMBOLS_SESSION_TOKEN").filter(|t| !t.trim().is_empty());
        let timeouts = RegistryTimeouts {
            request_secs: parse_u64(lookup("SYMBOLS_REQUEST_TIMEOUT_SECS"), DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(lookup("SYMBOLS_CONNECT_TIMEOUT_SECS"), DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Self::new(base_url, session_token, timeouts)
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::ConfigParse`] if `base_url` is blank.
    pub fn new(
        base_url: impl Into<String>,
        session_token: Option<String>,
        timeouts: RegistryTimeouts,
    ) -> Result<Self, RegistryError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(RegistryError::ConfigParse("SYMBOLS_API_BASE_URL is empty".into()));
        }
        Ok(Self { base_url, session_token, timeouts })
    }
}

fn parse_u64(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
