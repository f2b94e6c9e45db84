//! Presentation controller: grouped listing and per-item actions.
//!
//! DESIGN
//! ======
//! Each list item runs its own small state machine:
//!
//! ```text
//! Idle -> MenuOpen -> { Renaming | ConfirmingDelete | ConfirmingPromote
//!                     | ConfirmingLibrarySave } -> Idle
//! ```
//!
//! Items are independent, so actions on different symbols may overlap. An
//! item with a request outstanding is marked busy until it settles; a second
//! submit for that item (e.g. Enter and blur both firing on a rename field)
//! is dropped without a request.
//!
//! ERROR HANDLING
//! ==============
//! Failed actions show a message in a single banner that clears itself after
//! [`ERROR_DISPLAY`]. A newer error replaces the current one immediately.

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::canvas::{DragStage, Inserted, insert_symbol};
use super::permission::{Actor, ItemAction, available_actions, creatable_scopes};
use crate::config::ERROR_DISPLAY;
use crate::fragment::Fragment;
use crate::registry::RegistryClient;
use crate::scope::Scope;
use crate::session::{EditingSession, find_main_for_symbol};
use crate::symbol::{Symbol, SymbolPatch};

const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ItemState {
    #[default]
    Idle,
    MenuOpen,
    Renaming { draft: String },
    ConfirmingDelete,
    ConfirmingPromote(Scope),
    ConfirmingLibrarySave,
}

/// Result of a submitted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The registry accepted the change.
    Done,
    /// Nothing to do: wrong state, duplicate submit, unchanged input, or a
    /// result that arrived after the registry client was unmounted.
    NoOp,
    /// The action failed; the banner carries the reason.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolGroup {
    pub scope: Scope,
    pub symbols: Vec<Symbol>,
}

/// Filter by case-insensitive name substring, then partition by scope in
/// display order. Empty groups are omitted.
#[must_use]
pub fn group_symbols(symbols: &[Symbol], filter: &str) -> Vec<SymbolGroup> {
    let needle = filter.trim().to_lowercase();
    let matching: Vec<&Symbol> = symbols
        .iter()
        .filter(|s| needle.is_empty() || s.name.to_lowercase().contains(&needle))
        .collect();

    Scope::ALL
        .into_iter()
        .filter_map(|scope| {
            let symbols: Vec<Symbol> = matching
                .iter()
                .filter(|s| s.scope == scope)
                .map(|s| (*s).clone())
                .collect();
            (!symbols.is_empty()).then_some(SymbolGroup { scope, symbols })
        })
        .collect()
}

// =============================================================================
// ERROR BANNER
// =============================================================================

#[derive(Debug, Default)]
pub struct ErrorBanner {
    current: Option<(String, Instant)>,
}

impl ErrorBanner {
    pub fn show(&mut self, message: impl Into<String>, now: Instant) {
        self.current = Some((message.into(), now));
    }

    /// The visible message at `now`, if it has not expired.
    #[must_use]
    pub fn message(&self, now: Instant) -> Option<&str> {
        let (message, shown_at) = self.current.as_ref()?;
        (now.saturating_duration_since(*shown_at) < ERROR_DISPLAY).then_some(message.as_str())
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

#[derive(Default)]
struct Items {
    states: HashMap<Uuid, ItemState>,
    busy: HashSet<Uuid>,
}

pub struct PresentationController {
    registry: Arc<RegistryClient>,
    actor: Actor,
    prototype_id: Option<Uuid>,
    filter: Mutex<String>,
    items: Mutex<Items>,
    banner: Mutex<ErrorBanner>,
}

impl PresentationController {
    #[must_use]
    pub fn new(registry: Arc<RegistryClient>, actor: Actor, prototype_id: Option<Uuid>) -> Self {
        Self {
            registry,
            actor,
            prototype_id,
            filter: Mutex::new(String::new()),
            items: Mutex::new(Items::default()),
            banner: Mutex::new(ErrorBanner::default()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RegistryClient> {
        &self.registry
    }

    #[must_use]
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    fn items(&self) -> MutexGuard<'_, Items> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn banner(&self) -> MutexGuard<'_, ErrorBanner> {
        self.banner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Listing
    // -------------------------------------------------------------------------

    pub fn set_filter(&self, filter: &str) {
        *self.filter.lock().unwrap_or_else(PoisonError::into_inner) = filter.to_owned();
    }

    #[must_use]
    pub fn groups(&self) -> Vec<SymbolGroup> {
        let filter = self
            .filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        group_symbols(&self.registry.symbols(), &filter)
    }

    /// List-level error from the last fetch or mutation.
    #[must_use]
    pub fn list_error(&self) -> Option<String> {
        self.registry.last_error()
    }

    /// Item-level error banner, if still visible.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.banner()
            .message(Instant::now())
            .map(str::to_owned)
    }

    pub fn dismiss_error(&self) {
        self.banner().clear();
    }

    pub async fn refresh(&self) {
        self.registry.list().await;
    }

    /// User-initiated retry after a failed load.
    pub async fn retry(&self) {
        self.registry.retry().await;
    }

    fn report(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "symbol action failed");
        self.banner().show(message, Instant::now());
    }

    fn report_registry_failure(&self) {
        let message = self
            .registry
            .last_error()
            .unwrap_or_else(|| GENERIC_ERROR.to_owned());
        self.report(message);
    }

    // -------------------------------------------------------------------------
    // Item state machine
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn item_state(&self, id: Uuid) -> ItemState {
        self.items().states.get(&id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_busy(&self, id: Uuid) -> bool {
        self.items().busy.contains(&id)
    }

    /// Menu entries for an item under the current actor.
    #[must_use]
    pub fn actions(&self, id: Uuid) -> Vec<ItemAction> {
        self.registry
            .get(id)
            .map(|symbol| available_actions(&symbol, &self.actor))
            .unwrap_or_default()
    }

    pub fn open_menu(&self, id: Uuid) -> bool {
        if self.registry.get(id).is_none() {
            return false;
        }
        self.transition(id, |state| matches!(state, ItemState::Idle), ItemState::MenuOpen)
    }

    /// Return to idle. Ignored while a request for the item is outstanding.
    pub fn close(&self, id: Uuid) {
        let mut items = self.items();
        if !items.busy.contains(&id) {
            items.states.remove(&id);
        }
    }

    pub fn start_rename(&self, id: Uuid) -> bool {
        let Some(symbol) = self.registry.get(id) else {
            return false;
        };
        self.start(id, ItemAction::Rename, ItemState::Renaming { draft: symbol.name })
    }

    pub fn start_delete(&self, id: Uuid) -> bool {
        self.start(id, ItemAction::Delete, ItemState::ConfirmingDelete)
    }

    pub fn start_promote(&self, id: Uuid, target: Scope) -> bool {
        self.start(id, ItemAction::Promote(target), ItemState::ConfirmingPromote(target))
    }

    pub fn start_library_save(&self, id: Uuid) -> bool {
        self.start(id, ItemAction::LibrarySave, ItemState::ConfirmingLibrarySave)
    }

    pub fn set_rename_draft(&self, id: Uuid, draft: &str) {
        if let Some(ItemState::Renaming { draft: current }) = self.items().states.get_mut(&id) {
            draft.clone_into(current);
        }
    }

    fn start(&self, id: Uuid, action: ItemAction, next: ItemState) -> bool {
        if !self.actions(id).contains(&action) {
            debug!(%id, ?action, "action not offered");
            return false;
        }
        self.transition(id, |state| matches!(state, ItemState::MenuOpen), next)
    }

    fn transition(&self, id: Uuid, from: impl Fn(&ItemState) -> bool, to: ItemState) -> bool {
        let mut items = self.items();
        if items.busy.contains(&id) {
            return false;
        }
        let current = items.states.get(&id).cloned().unwrap_or_default();
        if !from(&current) {
            return false;
        }
        items.states.insert(id, to);
        true
    }

    /// Claim the item for one request if it is in the expected state.
    fn claim(&self, id: Uuid, expected: impl Fn(&ItemState) -> bool) -> Option<ItemState> {
        let mut items = self.items();
        if items.busy.contains(&id) {
            debug!(%id, "duplicate submit ignored");
            return None;
        }
        let state = items.states.get(&id).cloned().unwrap_or_default();
        if !expected(&state) {
            return None;
        }
        items.busy.insert(id);
        Some(state)
    }

    fn settle(&self, id: Uuid, succeeded: bool) -> Outcome {
        {
            let mut items = self.items();
            items.busy.remove(&id);
            items.states.remove(&id);
        }
        if succeeded {
            Outcome::Done
        } else if !self.registry.is_mounted() {
            debug!(%id, "result discarded after unmount");
            Outcome::NoOp
        } else {
            self.report_registry_failure();
            Outcome::Failed
        }
    }

    // -------------------------------------------------------------------------
    // Submits
    // -------------------------------------------------------------------------

    /// Submit a rename. Empty or unchanged input closes the editor without a
    /// request; a submit while one is outstanding is ignored.
    pub async fn submit_rename(&self, id: Uuid, input: &str) -> Outcome {
        let current = self.registry.get(id).map(|s| s.name);
        if self
            .claim(id, |state| matches!(state, ItemState::Renaming { .. }))
            .is_none()
        {
            return Outcome::NoOp;
        }

        let name = input.trim();
        if name.is_empty() || current.as_deref() == Some(name) {
            let mut items = self.items();
            items.busy.remove(&id);
            items.states.remove(&id);
            return Outcome::NoOp;
        }

        let updated = self
            .registry
            .update(id, SymbolPatch::rename(name))
            .await;
        self.settle(id, updated.is_some())
    }

    pub async fn confirm_delete(&self, id: Uuid) -> Outcome {
        if self
            .claim(id, |state| matches!(state, ItemState::ConfirmingDelete))
            .is_none()
        {
            return Outcome::NoOp;
        }
        let removed = self.registry.remove(id).await;
        self.settle(id, removed)
    }

    pub async fn confirm_promote(&self, id: Uuid) -> Outcome {
        let Some(ItemState::ConfirmingPromote(target)) =
            self.claim(id, |state| matches!(state, ItemState::ConfirmingPromote(_)))
        else {
            return Outcome::NoOp;
        };
        let promoted = self.registry.promote(id, target).await;
        self.settle(id, promoted.is_some())
    }

    /// Push the live main definition's current content back to the registry.
    /// The stored fragment id is kept so existing instances stay linked.
    pub async fn confirm_library_save<S: EditingSession + ?Sized>(&self, id: Uuid, session: &S) -> Outcome {
        if self
            .claim(id, |state| matches!(state, ItemState::ConfirmingLibrarySave))
            .is_none()
        {
            return Outcome::NoOp;
        }

        let content = match self.live_content(id, session) {
            Ok(content) => content,
            Err(message) => {
                {
                    let mut items = self.items();
                    items.busy.remove(&id);
                    items.states.remove(&id);
                }
                self.report(message);
                return Outcome::Failed;
            }
        };

        let updated = self
            .registry
            .update(id, SymbolPatch::content(content))
            .await;
        self.settle(id, updated.is_some())
    }

    /// Serialized main definition for `id`, re-keyed to the stored fragment id.
    fn live_content<S: EditingSession + ?Sized>(&self, id: Uuid, session: &S) -> Result<Fragment, String> {
        const NOT_ON_CANVAS: &str = "This symbol is not on the canvas, so there is nothing to save.";

        let symbol = self.registry.get(id).ok_or(GENERIC_ERROR)?;
        let fragment_id = symbol.fragment_id().ok_or(NOT_ON_CANVAS)?;
        let main = find_main_for_symbol(session, &symbol).ok_or(NOT_ON_CANVAS)?;
        let fragment = session
            .serialize_subtree(&main.component)
            .map_err(|e| format!("Could not read \"{}\" from the canvas: {e}", symbol.name))?;
        Ok(fragment.with_id(fragment_id))
    }

    // -------------------------------------------------------------------------
    // Create / insert
    // -------------------------------------------------------------------------

    /// Save the session's selected component as a new symbol in `scope`.
    pub async fn save_selection<S: EditingSession + ?Sized>(
        &self,
        session: &S,
        name: &str,
        scope: Scope,
    ) -> Option<Symbol> {
        if !creatable_scopes(&self.actor, self.prototype_id.is_some()).contains(&scope) {
            debug!(%scope, "scope not offered for create");
            return None;
        }
        let Some(selected) = session.selected_component() else {
            self.report("Select an element to save it as a symbol.");
            return None;
        };
        let fragment = match session.serialize_subtree(&selected) {
            Ok(fragment) => fragment,
            Err(e) => {
                self.report(format!("Could not read the selection: {e}"));
                return None;
            }
        };

        let created = self
            .registry
            .create(name, fragment, scope, self.prototype_id)
            .await;
        if created.is_none() && self.registry.is_mounted() {
            self.report_registry_failure();
        }
        created
    }

    pub fn insert<S: EditingSession + ?Sized>(&self, id: Uuid, session: &mut S) -> Option<Inserted> {
        let symbol = self.registry.get(id)?;
        match insert_symbol(&symbol, session) {
            Ok(inserted) => Some(inserted),
            Err(e) => {
                self.report(format!("Could not insert \"{}\": {e}", symbol.name));
                None
            }
        }
    }

    pub fn begin_drag<'s, S: EditingSession + ?Sized>(&self, id: Uuid, session: &'s mut S) -> Option<DragStage<'s, S>> {
        let symbol = self.registry.get(id)?;
        Some(DragStage::begin(&symbol, session))
    }
}
