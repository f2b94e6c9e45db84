//! Registry client: cached, mount-aware symbol state for one team.
//!
//! DESIGN
//! ======
//! The client owns a versioned snapshot (symbol list + id index). Every
//! mutation goes through a CRUD method here, so three rules are enforced in
//! one place:
//!
//! - mount guard: results that arrive after [`RegistryClient::unmount`] are
//!   dropped instead of being written to the snapshot.
//! - single in-flight request per symbol: a second update, delete or
//!   promote for the same id is refused with `Busy` until the first settles.
//! - derived views are memoized against the snapshot version.
//!
//! The snapshot lock is a plain `std::sync::Mutex` and is never held across
//! an `.await`.
//!
//! ERROR HANDLING
//! ==============
//! Public operations return `Option`/`bool` and record a user-facing string
//! in `last_error`. There is no automatic retry; [`RegistryClient::retry`]
//! re-runs the last fetch on demand.
//!
//! TRADE-OFFS
//! ==========
//! Last write wins. No version token is exchanged with the registry, so a
//! concurrent edit from another session can overwrite silently.

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api::RegistryApi;
use crate::error::RegistryError;
use crate::fragment::Fragment;
use crate::scope::{self, Scope, SessionRef, strip_known_prefix, with_scope_prefix};
use crate::symbol::{NewSymbol, Symbol, SymbolPatch, validate_name};

// =============================================================================
// TYPES
// =============================================================================

/// A registry fragment in the form the editing session consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFragment {
    pub session_ref: SessionRef,
    /// Back-reference to the originating symbol.
    pub symbol_id: Uuid,
    /// Payload with its `id` rewritten to the prefixed session id.
    pub fragment: Fragment,
}

impl SessionFragment {
    #[must_use]
    pub fn session_id(&self) -> String {
        self.session_ref.to_string()
    }
}

/// Shared flag torn down when the owning UI context goes away.
#[derive(Debug, Clone)]
pub struct MountHandle(Arc<AtomicBool>);

impl MountHandle {
    pub fn unmount(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct Snapshot {
    symbols: Vec<Symbol>,
    index: HashMap<Uuid, usize>,
    version: u64,
    loading: bool,
    last_error: Option<String>,
    in_flight: HashSet<Uuid>,
}

impl Snapshot {
    fn bump(&mut self) {
        self.version += 1;
    }

    fn reindex(&mut self) {
        self.index = self
            .symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
    }

    fn replace_all(&mut self, symbols: Vec<Symbol>) {
        self.symbols = symbols;
        self.reindex();
        self.bump();
    }

    /// Insert, or replace in place when the id is already present.
    fn upsert(&mut self, symbol: Symbol) {
        if let Some(&i) = self.index.get(&symbol.id) {
            self.symbols[i] = symbol;
        } else {
            self.index.insert(symbol.id, self.symbols.len());
            self.symbols.push(symbol);
        }
        self.bump();
    }

    fn remove(&mut self, id: Uuid) -> bool {
        let Some(i) = self.index.get(&id).copied() else {
            return false;
        };
        self.symbols.remove(i);
        self.reindex();
        self.bump();
        true
    }
}

struct DerivedViews {
    version: u64,
    fragments: Arc<[SessionFragment]>,
}

/// Marks a symbol busy for the lifetime of one request.
struct InFlight<'a> {
    state: &'a Mutex<Snapshot>,
    id: Uuid,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .remove(&self.id);
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct RegistryClient {
    api: Arc<dyn RegistryApi>,
    team_id: Option<Uuid>,
    state: Mutex<Snapshot>,
    views: Mutex<Option<DerivedViews>>,
    mounted: MountHandle,
}

impl RegistryClient {
    #[must_use]
    pub fn new(api: Arc<dyn RegistryApi>, team_id: Option<Uuid>) -> Self {
        Self {
            api,
            team_id,
            state: Mutex::new(Snapshot::default()),
            views: Mutex::new(None),
            mounted: MountHandle(Arc::new(AtomicBool::new(true))),
        }
    }

    #[must_use]
    pub fn team_id(&self) -> Option<Uuid> {
        self.team_id
    }

    /// A handle the owning context can use to tear the client down.
    #[must_use]
    pub fn mount_handle(&self) -> MountHandle {
        self.mounted.clone()
    }

    pub fn unmount(&self) {
        self.mounted.unmount();
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted.is_mounted()
    }

    fn state(&self) -> MutexGuard<'_, Snapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        self.state().symbols.clone()
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Symbol> {
        let state = self.state();
        state.index.get(&id).map(|&i| state.symbols[i].clone())
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.state().version
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.state().last_error = None;
    }

    #[must_use]
    pub fn is_in_flight(&self, id: Uuid) -> bool {
        self.state().in_flight.contains(&id)
    }

    // -------------------------------------------------------------------------
    // Derived views
    // -------------------------------------------------------------------------

    /// Every stored fragment, prefixed for its scope and tagged with its
    /// symbol id. Recomputed only when the snapshot version changes.
    #[must_use]
    pub fn as_session_fragments(&self) -> Arc<[SessionFragment]> {
        let (version, symbols) = {
            let state = self.state();
            let views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = views.as_ref().filter(|v| v.version == state.version) {
                return Arc::clone(&cached.fragments);
            }
            (state.version, state.symbols.clone())
        };

        let fragments: Arc<[SessionFragment]> = symbols.iter().filter_map(session_fragment).collect();
        debug!(version, count = fragments.len(), "recomputed session fragments");

        let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
        if views.as_ref().is_none_or(|v| v.version < version) {
            *views = Some(DerivedViews { version, fragments: Arc::clone(&fragments) });
        }
        fragments
    }

    #[must_use]
    pub fn is_managed_id(&self, id: &str) -> bool {
        scope::is_managed_id(id)
    }

    /// Resolve a session id back to its symbol.
    ///
    /// Candidates are tried in order: the raw id, the id with its known
    /// prefix stripped, then the stripped id under each known prefix.
    #[must_use]
    pub fn find_by_fragment_id(&self, session_id: &str) -> Option<Symbol> {
        let clean = strip_known_prefix(session_id).clean_id;
        let candidates = [session_id.to_owned(), clean.to_owned()]
            .into_iter()
            .chain(scope::prefixed_variants(clean));

        let state = self.state();
        for candidate in candidates {
            if let Some(symbol) = state
                .symbols
                .iter()
                .find(|s| s.fragment_id() == Some(candidate.as_str()))
            {
                return Some(symbol.clone());
            }
        }
        None
    }

    // -------------------------------------------------------------------------
    // Fetch
    // -------------------------------------------------------------------------

    /// Fetch all symbols for the team across every scope, replacing the
    /// snapshot. Without a team this is a no-op returning nothing.
    pub async fn list(&self) -> Vec<Symbol> {
        let Some(team_id) = self.team_id else {
            return Vec::new();
        };

        self.state().loading = true;
        let result = self.api.list(team_id).await;

        if !self.is_mounted() {
            debug!(%team_id, "discarding symbol list for unmounted client");
            return Vec::new();
        }

        let mut state = self.state();
        state.loading = false;
        match result {
            Ok(symbols) => {
                info!(%team_id, count = symbols.len(), "loaded symbols");
                state.last_error = None;
                state.replace_all(symbols.clone());
                symbols
            }
            Err(e) => {
                warn!(%team_id, error = %e, "symbol list failed");
                state.last_error = Some(format!("Failed to load symbols: {e}"));
                Vec::new()
            }
        }
    }

    /// User-initiated re-fetch after a failure.
    pub async fn retry(&self) -> Vec<Symbol> {
        self.clear_error();
        self.list().await
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Create a symbol from a fragment. The fragment id is rewritten to carry
    /// the scope prefix; payloads without an id get a fresh one.
    pub async fn create(
        &self,
        name: &str,
        fragment_data: Fragment,
        scope: Scope,
        prototype_id: Option<Uuid>,
    ) -> Option<Symbol> {
        let body = match self.prepare_create(name, fragment_data, scope, prototype_id) {
            Ok(body) => body,
            Err(e) => {
                self.reject("create symbol", e);
                return None;
            }
        };
        let team_id = self.team_id?;

        let result = self.api.create(team_id, &body).await;
        self.commit("create symbol", result, |state, symbol| {
            info!(%team_id, symbol_id = %symbol.id, scope = %symbol.scope, "created symbol");
            state.upsert(symbol.clone());
        })
    }

    fn prepare_create(
        &self,
        name: &str,
        mut fragment_data: Fragment,
        scope: Scope,
        prototype_id: Option<Uuid>,
    ) -> Result<NewSymbol, RegistryError> {
        if self.team_id.is_none() {
            return Err(RegistryError::NoTeam);
        }
        let name = validate_name(name)?;
        let prototype_id = match scope {
            Scope::Prototype => Some(prototype_id.ok_or(RegistryError::MissingPrototype)?),
            Scope::Team | Scope::Organization => None,
        };

        let base_id = fragment_data
            .id()
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);
        fragment_data.set_id(with_scope_prefix(&base_id, scope));

        Ok(NewSymbol { name, fragment_data, scope, prototype_id })
    }

    /// Partial update of name and/or content.
    pub async fn update(&self, id: Uuid, patch: SymbolPatch) -> Option<Symbol> {
        let (team_id, patch) = match self.prepare_update(id, patch) {
            Ok(ready) => ready,
            Err(e) => {
                self.reject("update symbol", e);
                return None;
            }
        };
        let _guard = match self.begin(id) {
            Ok(guard) => guard,
            Err(e) => {
                self.reject("update symbol", e);
                return None;
            }
        };

        let result = self.api.update(team_id, id, &patch).await;
        self.commit("update symbol", result, |state, symbol| {
            info!(%team_id, symbol_id = %symbol.id, "updated symbol");
            state.upsert(symbol.clone());
        })
    }

    fn prepare_update(&self, id: Uuid, mut patch: SymbolPatch) -> Result<(Uuid, SymbolPatch), RegistryError> {
        let team_id = self.team_id.ok_or(RegistryError::NoTeam)?;
        if let Some(name) = patch.name.take() {
            patch.name = Some(validate_name(&name)?);
        }
        if patch.is_empty() {
            return Err(RegistryError::EmptyUpdate);
        }
        if self.get(id).is_none() {
            return Err(RegistryError::UnknownSymbol);
        }
        Ok((team_id, patch))
    }

    /// Delete a symbol. The snapshot changes only on confirmed success.
    pub async fn remove(&self, id: Uuid) -> bool {
        let Some(team_id) = self.team_id else {
            self.reject("delete symbol", RegistryError::NoTeam);
            return false;
        };
        let _guard = match self.begin(id) {
            Ok(guard) => guard,
            Err(e) => {
                self.reject("delete symbol", e);
                return false;
            }
        };

        let result = self.api.delete(team_id, id).await;
        self.commit("delete symbol", result, |state, _| {
            info!(%team_id, symbol_id = %id, "deleted symbol");
            state.remove(id);
        })
        .is_some()
    }

    /// Copy a symbol to a strictly broader scope. The source is untouched.
    pub async fn promote(&self, id: Uuid, target_scope: Scope) -> Option<Symbol> {
        let team_id = match self.prepare_promote(id, target_scope) {
            Ok(team_id) => team_id,
            Err(e) => {
                self.reject("promote symbol", e);
                return None;
            }
        };
        let _guard = match self.begin(id) {
            Ok(guard) => guard,
            Err(e) => {
                self.reject("promote symbol", e);
                return None;
            }
        };

        let result = self.api.promote(team_id, id, target_scope).await;
        self.commit("promote symbol", result, |state, symbol| {
            info!(%team_id, source_id = %id, symbol_id = %symbol.id, scope = %symbol.scope, "promoted symbol");
            state.upsert(symbol.clone());
        })
    }

    fn prepare_promote(&self, id: Uuid, target: Scope) -> Result<Uuid, RegistryError> {
        let team_id = self.team_id.ok_or(RegistryError::NoTeam)?;
        let source = self.get(id).ok_or(RegistryError::UnknownSymbol)?;
        if target == Scope::Prototype || target <= source.scope {
            return Err(RegistryError::InvalidPromotion { from: source.scope, to: target });
        }
        Ok(team_id)
    }

    // -------------------------------------------------------------------------
    // Guards
    // -------------------------------------------------------------------------

    fn begin(&self, id: Uuid) -> Result<InFlight<'_>, RegistryError> {
        let mut state = self.state();
        if !state.in_flight.insert(id) {
            return Err(RegistryError::Busy);
        }
        Ok(InFlight { state: &self.state, id })
    }

    /// Record a failure that never reached the network.
    fn reject(&self, op: &str, err: RegistryError) {
        if matches!(err, RegistryError::Busy) {
            debug!(op, "request already in flight; ignoring");
            return;
        }
        if self.is_mounted() {
            self.state().last_error = Some(format!("Failed to {op}: {err}"));
        }
    }

    /// Apply a settled result unless the client was unmounted meanwhile.
    fn commit<T>(
        &self,
        op: &str,
        result: Result<T, RegistryError>,
        apply: impl FnOnce(&mut Snapshot, &T),
    ) -> Option<T> {
        if !self.is_mounted() {
            debug!(op, ok = result.is_ok(), "discarding result for unmounted client");
            return None;
        }

        let mut state = self.state();
        match result {
            Ok(value) => {
                state.last_error = None;
                apply(&mut *state, &value);
                Some(value)
            }
            Err(e) => {
                warn!(op, error = %e, "registry request failed");
                state.last_error = Some(format!("Failed to {op}: {e}"));
                None
            }
        }
    }
}

fn session_fragment(symbol: &Symbol) -> Option<SessionFragment> {
    let session_id = symbol.session_id()?;
    let session_ref = SessionRef::parse(&session_id)?;
    Some(SessionFragment {
        session_ref,
        symbol_id: symbol.id,
        fragment: symbol.fragment_data.clone().with_id(session_id),
    })
}
