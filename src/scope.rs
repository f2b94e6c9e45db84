//! Scope prefix codec.
//!
//! DESIGN
//! ======
//! The editing session identifies linked main definitions by a single string
//! id. Registry-backed fragments carry a scope prefix (`proto-`, `team-`,
//! `org-`) so a session id can be traced back to the registry scope that owns
//! it. The `global-` prefix predates scoped registries: it is recognized on
//! read and never produced.
//!
//! Inside the crate the pair travels as a [`SessionRef`]; prefix strings only
//! appear where the session demands a single string id.

#[cfg(test)]
#[path = "scope_test.rs"]
mod tests;

use std::fmt;

use serde::{Deserialize, Serialize};

pub const PROTOTYPE_PREFIX: &str = "proto-";
pub const TEAM_PREFIX: &str = "team-";
pub const ORGANIZATION_PREFIX: &str = "org-";
/// Read-only. Ids with this prefix are still managed but never minted.
pub const LEGACY_GLOBAL_PREFIX: &str = "global-";

/// Fixed match order for [`strip_known_prefix`].
const KNOWN_PREFIXES: [(&str, Option<Scope>); 4] = [
    (PROTOTYPE_PREFIX, Some(Scope::Prototype)),
    (TEAM_PREFIX, Some(Scope::Team)),
    (ORGANIZATION_PREFIX, Some(Scope::Organization)),
    (LEGACY_GLOBAL_PREFIX, None),
];

// =============================================================================
// SCOPE
// =============================================================================

/// Sharing breadth of a symbol. Ordered narrowest to broadest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Prototype,
    Team,
    Organization,
}

impl Scope {
    /// Display order used by grouped listings.
    pub const ALL: [Scope; 3] = [Scope::Prototype, Scope::Team, Scope::Organization];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prototype => "prototype",
            Self::Team => "team",
            Self::Organization => "organization",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "prototype" => Some(Self::Prototype),
            "team" => Some(Self::Team),
            "organization" => Some(Self::Organization),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Result of [`strip_known_prefix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stripped<'a> {
    pub clean_id: &'a str,
    pub matched_prefix: Option<&'static str>,
}

#[must_use]
pub fn prefix_for_scope(scope: Scope) -> &'static str {
    match scope {
        Scope::Prototype => PROTOTYPE_PREFIX,
        Scope::Team => TEAM_PREFIX,
        Scope::Organization => ORGANIZATION_PREFIX,
    }
}

/// Prefix for a raw scope tag. Unrecognized tags map to the team prefix.
#[must_use]
pub fn prefix_for_scope_name(raw: &str) -> &'static str {
    Scope::parse(raw).map_or(TEAM_PREFIX, prefix_for_scope)
}

/// Remove the first matching known prefix, checked in fixed order.
#[must_use]
pub fn strip_known_prefix(id: &str) -> Stripped<'_> {
    for (prefix, _) in KNOWN_PREFIXES {
        if let Some(clean_id) = id.strip_prefix(prefix) {
            return Stripped { clean_id, matched_prefix: Some(prefix) };
        }
    }
    Stripped { clean_id: id, matched_prefix: None }
}

/// True iff `id` carries any of the four known prefixes.
#[must_use]
pub fn is_managed_id(id: &str) -> bool {
    strip_known_prefix(id).matched_prefix.is_some()
}

/// Prefix `id` for `scope` unless it already carries that scope's prefix.
#[must_use]
pub fn with_scope_prefix(id: &str, scope: Scope) -> String {
    let prefix = prefix_for_scope(scope);
    if id.starts_with(prefix) {
        id.to_owned()
    } else {
        format!("{prefix}{id}")
    }
}

/// Every key a base id could have been stored under, in lookup order.
pub(crate) fn prefixed_variants(base_id: &str) -> impl Iterator<Item = String> + '_ {
    KNOWN_PREFIXES
        .into_iter()
        .map(move |(prefix, _)| format!("{prefix}{base_id}"))
}

// =============================================================================
// SESSION REF
// =============================================================================

/// Typed form of a managed session id.
///
/// `scope` is `None` only for ids parsed from the legacy `global-` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionRef {
    pub scope: Option<Scope>,
    pub base_id: String,
}

impl SessionRef {
    #[must_use]
    pub fn new(scope: Scope, base_id: impl Into<String>) -> Self {
        Self { scope: Some(scope), base_id: base_id.into() }
    }

    /// Parse a session id. Returns `None` for unmanaged (document-local) ids.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        let stripped = strip_known_prefix(id);
        let prefix = stripped.matched_prefix?;
        let scope = KNOWN_PREFIXES
            .iter()
            .find(|(known, _)| *known == prefix)
            .and_then(|(_, scope)| *scope);
        Some(Self { scope, base_id: stripped.clean_id.to_owned() })
    }

    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.scope.is_none()
    }
}

impl fmt::Display for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.scope.map_or(LEGACY_GLOBAL_PREFIX, prefix_for_scope);
        write!(f, "{prefix}{}", self.base_id)
    }
}
