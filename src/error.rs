//! Error types for registry and session operations.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here is fatal to the editing session. Registry failures become a
//! user-facing string on the client (see `RegistryClient::last_error`) and
//! the caller decides whether to offer a retry. Permission failures never
//! reach this layer: gated actions are simply not offered.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

use crate::scope::Scope;
use crate::symbol::NameError;

/// Stable machine-readable code for an error, plus a retry hint.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The transport rejected the request before a response arrived.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The registry answered with a non-success status.
    #[error("registry returned {status}: {message}")]
    Response { status: u16, message: String },

    #[error("response parse failed: {0}")]
    Parse(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    #[error("config parse failed: {0}")]
    ConfigParse(String),

    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    #[error("cannot promote a {from} symbol to {to}")]
    InvalidPromotion { from: Scope, to: Scope },

    #[error("prototype-scope symbols need a prototype")]
    MissingPrototype,

    #[error("nothing to update")]
    EmptyUpdate,

    #[error("no team selected")]
    NoTeam,

    #[error("symbol not found")]
    UnknownSymbol,

    /// The item already has a request outstanding.
    #[error("another action on this symbol is still in progress")]
    Busy,
}

impl RegistryError {
    /// Caught before any network call.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidName(_)
                | Self::InvalidPromotion { .. }
                | Self::MissingPrototype
                | Self::EmptyUpdate
                | Self::NoTeam
                | Self::UnknownSymbol
        )
    }
}

impl ErrorCode for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NetworkFailure(_) => "E_NETWORK",
            Self::Response { .. } => "E_REGISTRY_RESPONSE",
            Self::Parse(_) => "E_REGISTRY_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::InvalidName(_) => "E_INVALID_NAME",
            Self::InvalidPromotion { .. } => "E_INVALID_PROMOTION",
            Self::MissingPrototype => "E_MISSING_PROTOTYPE",
            Self::EmptyUpdate => "E_EMPTY_UPDATE",
            Self::NoTeam => "E_NO_TEAM",
            Self::UnknownSymbol => "E_SYMBOL_NOT_FOUND",
            Self::Busy => "E_BUSY",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Failures reported by the editing session capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("main definition not found: {0}")]
    MainNotFound(String),
    #[error("component not found: {0}")]
    ComponentNotFound(String),
    #[error("session rejected the operation: {0}")]
    Rejected(String),
}
