//! Registry HTTP API.
//!
//! Endpoints, all relative to the configured base URL:
//!
//! - `GET    /teams/{teamId}/symbols`              -> `{ symbols: Symbol[] }`
//! - `POST   /teams/{teamId}/symbols`              -> `Symbol`
//! - `PATCH  /teams/{teamId}/symbols/{id}`         -> `Symbol`
//! - `DELETE /teams/{teamId}/symbols/{id}`         -> empty
//! - `POST   /teams/{teamId}/symbols/{id}/promote` -> `Symbol`
//!
//! Pure parsing lives in `parse_*` helpers for testability.

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;

use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::scope::Scope;
use crate::symbol::{NewSymbol, Symbol, SymbolPatch};

// =============================================================================
// TRAIT
// =============================================================================

/// Server-side symbol registry. Every call is scoped to one team.
#[async_trait::async_trait]
pub trait RegistryApi: Send + Sync {
    async fn list(&self, team_id: Uuid) -> Result<Vec<Symbol>, RegistryError>;

    async fn create(&self, team_id: Uuid, body: &NewSymbol) -> Result<Symbol, RegistryError>;

    async fn update(&self, team_id: Uuid, symbol_id: Uuid, patch: &SymbolPatch) -> Result<Symbol, RegistryError>;

    async fn delete(&self, team_id: Uuid, symbol_id: Uuid) -> Result<(), RegistryError>;

    /// Server-side copy to a broader scope. The source record is untouched.
    async fn promote(&self, team_id: Uuid, symbol_id: Uuid, target_scope: Scope) -> Result<Symbol, RegistryError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpRegistry {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRegistry {
    /// # Errors
    ///
    /// Returns [`RegistryError::HttpClientBuild`] if the session token is not a
    /// valid header value or the reqwest client cannot be built.
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.session_token {
            let value = HeaderValue::from_str(&format!("session_token={token}"))
                .map_err(|e| RegistryError::HttpClientBuild(e.to_string()))?;
            headers.insert(COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| RegistryError::HttpClientBuild(e.to_string()))?;

        Ok(Self { http, base_url: config.base_url.clone() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn symbols_url(&self, team_id: Uuid) -> String {
        format!("{}/teams/{team_id}/symbols", self.base_url)
    }

    fn symbol_url(&self, team_id: Uuid, symbol_id: Uuid) -> String {
        format!("{}/{symbol_id}", self.symbols_url(team_id))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, RegistryError> {
        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RegistryError::NetworkFailure(e.to_string()))?;

        if !status.is_success() {
            return Err(RegistryError::Response { status: status.as_u16(), message: error_message(&text) });
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl RegistryApi for HttpRegistry {
    async fn list(&self, team_id: Uuid) -> Result<Vec<Symbol>, RegistryError> {
        let text = self.send(self.http.get(self.symbols_url(team_id))).await?;
        let symbols = parse_symbol_list(&text)?;
        debug!(%team_id, count = symbols.len(), "registry list");
        Ok(symbols)
    }

    async fn create(&self, team_id: Uuid, body: &NewSymbol) -> Result<Symbol, RegistryError> {
        let text = self
            .send(self.http.post(self.symbols_url(team_id)).json(body))
            .await?;
        parse_json(&text)
    }

    async fn update(&self, team_id: Uuid, symbol_id: Uuid, patch: &SymbolPatch) -> Result<Symbol, RegistryError> {
        let text = self
            .send(self.http.patch(self.symbol_url(team_id, symbol_id)).json(patch))
            .await?;
        parse_json(&text)
    }

    async fn delete(&self, team_id: Uuid, symbol_id: Uuid) -> Result<(), RegistryError> {
        self.send(self.http.delete(self.symbol_url(team_id, symbol_id)))
            .await?;
        Ok(())
    }

    async fn promote(&self, team_id: Uuid, symbol_id: Uuid, target_scope: Scope) -> Result<Symbol, RegistryError> {
        let url = format!("{}/promote", self.symbol_url(team_id, symbol_id));
        let text = self
            .send(self.http.post(url).json(&PromoteBody { target_scope }))
            .await?;
        parse_json(&text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromoteBody {
    pub(crate) target_scope: Scope,
}

#[derive(Deserialize)]
struct SymbolListResponse {
    #[serde(default)]
    symbols: Vec<Symbol>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, RegistryError> {
    serde_json::from_str(text).map_err(|e| RegistryError::Parse(e.to_string()))
}

fn parse_symbol_list(text: &str) -> Result<Vec<Symbol>, RegistryError> {
    parse_json::<SymbolListResponse>(text).map(|r| r.symbols)
}

/// Best human-readable message from a failed response body.
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(msg) = parsed.error.or(parsed.message) {
            return msg;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() { "request failed".to_owned() } else { trimmed.to_owned() }
}
