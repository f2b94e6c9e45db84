//! Session reconciliation: registry fragments in on load, filtered out on
//! save.
//!
//! DESIGN
//! ======
//! Load: the registry is authoritative. A fragment saved in this document
//! may have been edited from another document since, so on id collision
//! the registry copy replaces the document copy in place. Registry fragments
//! the document has never seen are appended.
//!
//! Save: document-local fragments are always kept. Managed fragments are
//! kept only in native form, because the session relinks instances from
//! the native payload on the next load. Legacy snapshots were inserted by
//! value and are dropped rather than persisted as stale duplicates.

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::fragment::Fragment;
use crate::registry::RegistryClient;
use crate::scope::is_managed_id;
use crate::session::EditingSession;

/// Merge registry fragments into a document's fragment list.
///
/// Output order: existing entries in place (registry content substituted on
/// id match), then unmatched registry fragments in registry order.
#[must_use]
pub fn merge_into_document(document: &[Fragment], registry: &[Fragment]) -> Vec<Fragment> {
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for (i, fragment) in registry.iter().enumerate() {
        if let Some(id) = fragment.id() {
            by_id.entry(id).or_insert(i);
        }
    }

    let mut consumed = vec![false; registry.len()];
    let mut merged = Vec::with_capacity(document.len() + registry.len());

    for fragment in document {
        match fragment.id().and_then(|id| by_id.get(id)) {
            Some(&i) => {
                consumed[i] = true;
                merged.push(registry[i].clone());
            }
            None => merged.push(fragment.clone()),
        }
    }

    let mut appended: HashSet<&str> = HashSet::new();
    for (i, fragment) in registry.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        // Duplicate registry ids collapse onto the first occurrence.
        if let Some(id) = fragment.id() {
            if by_id.get(id) != Some(&i) || !appended.insert(id) {
                continue;
            }
        }
        merged.push(fragment.clone());
    }

    debug!(
        document = document.len(),
        registry = registry.len(),
        merged = merged.len(),
        "merged registry fragments into document"
    );
    merged
}

/// Filter a document's fragment list for persistence.
#[must_use]
pub fn extract_for_persistence(document: &[Fragment]) -> Vec<Fragment> {
    let kept: Vec<Fragment> = document
        .iter()
        .filter(|fragment| match fragment.id() {
            Some(id) if is_managed_id(id) => fragment.is_native(),
            _ => true,
        })
        .cloned()
        .collect();

    debug!(
        total = document.len(),
        kept = kept.len(),
        dropped = document.len() - kept.len(),
        "extracted fragments for persistence"
    );
    kept
}

/// Load path: merge the registry's current fragments into the session's
/// persisted list and write the result back.
pub fn load_into_session<S: EditingSession + ?Sized>(session: &mut S, registry: &RegistryClient) {
    let registry_fragments: Vec<Fragment> = registry
        .as_session_fragments()
        .iter()
        .map(|f| f.fragment.clone())
        .collect();
    let merged = merge_into_document(&session.persisted_fragments(), &registry_fragments);
    session.replace_persisted_fragments(merged);
}

/// Save path: the fragment list that should be stored with the document.
pub fn save_from_session<S: EditingSession + ?Sized>(session: &S) -> Vec<Fragment> {
    extract_for_persistence(&session.persisted_fragments())
}
