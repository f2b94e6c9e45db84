//! Symbol records and the request shapes sent to the registry.

#[cfg(test)]
#[path = "symbol_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::fragment::Fragment;
use crate::scope::{Scope, with_scope_prefix};

pub const MAX_NAME_LEN: usize = 255;

// =============================================================================
// SYMBOL
// =============================================================================

/// Server-persisted reusable fragment. Mirrors the registry's JSON record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub id: Uuid,
    pub name: String,
    pub scope: Scope,
    pub owner_team_id: Uuid,
    /// Set only when `scope` is `prototype`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_prototype_id: Option<Uuid>,
    pub created_by: Uuid,
    pub fragment_data: Fragment,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Symbol {
    /// The stored fragment's internal id, as the server has it.
    #[must_use]
    pub fn fragment_id(&self) -> Option<&str> {
        self.fragment_data.id()
    }

    /// The id this symbol's fragment is known by inside an editing session.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.fragment_id().map(|id| with_scope_prefix(id, self.scope))
    }
}

// =============================================================================
// NAMES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name must not be empty")]
    Empty,
    #[error("name is {len} characters; the limit is {MAX_NAME_LEN}")]
    TooLong { len: usize },
}

/// Trim and validate a display name.
///
/// # Errors
///
/// Returns [`NameError`] if the trimmed name is empty or longer than
/// [`MAX_NAME_LEN`] characters.
pub fn validate_name(raw: &str) -> Result<String, NameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(NameError::TooLong { len });
    }
    Ok(name.to_owned())
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Body of `POST /teams/{teamId}/symbols`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSymbol {
    pub name: String,
    pub fragment_data: Fragment,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prototype_id: Option<Uuid>,
}

/// Body of `PATCH /teams/{teamId}/symbols/{id}`. Absent fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_data: Option<Fragment>,
}

impl SymbolPatch {
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), fragment_data: None }
    }

    #[must_use]
    pub fn content(fragment_data: Fragment) -> Self {
        Self { name: None, fragment_data: Some(fragment_data) }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.fragment_data.is_none()
    }
}
