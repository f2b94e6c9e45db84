//! In-memory fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::{RegistryError, SessionError};
use crate::fragment::Fragment;
use crate::registry::{RegistryApi, RegistryClient};
use crate::scope::{Scope, strip_known_prefix, with_scope_prefix};
use crate::session::{ComponentId, EditingSession, MainDefinition, Placement};
use crate::symbol::{NewSymbol, Symbol, SymbolPatch};

pub const TEAM: Uuid = Uuid::from_u128(0x5d1c_3e6a_7b2f_4e8d_8c9a_1f2e_3d4c_5b6a);
pub const ALICE: Uuid = Uuid::from_u128(0xa11c_e000_0000_4000_8000_0000_0000_0001);
pub const BOB: Uuid = Uuid::from_u128(0xb0b0_0000_0000_4000_8000_0000_0000_0002);
pub const PROTOTYPE: Uuid = Uuid::from_u128(0x9707_0000_0000_4000_8000_0000_0000_0003);

// =============================================================================
// SYMBOLS
// =============================================================================

pub fn native(id: &str) -> Fragment {
    Fragment::new(json!({ "id": id, "type": "card", "components": [{ "type": "text", "content": "Hi" }] }))
}

pub fn legacy(id: &str) -> Fragment {
    Fragment::new(json!({ "id": id, "label": "Legacy", "children": [{ "type": "text", "content": "old" }] }))
}

pub fn symbol(name: &str, scope: Scope, created_by: Uuid, fragment: Fragment) -> Symbol {
    Symbol {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        scope,
        owner_team_id: TEAM,
        owner_prototype_id: (scope == Scope::Prototype).then_some(PROTOTYPE),
        created_by,
        fragment_data: fragment,
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

// =============================================================================
// FAKE REGISTRY
// =============================================================================

/// Server-side registry kept in memory. Optionally holds every response
/// until [`FakeRegistry::release`] is called.
#[derive(Default)]
pub struct FakeRegistry {
    pub store: Mutex<Vec<Symbol>>,
    pub calls: Mutex<Vec<&'static str>>,
    fail_with: Mutex<Option<RegistryError>>,
    gated: AtomicBool,
    gate: Notify,
}

impl FakeRegistry {
    pub fn with_symbols(symbols: Vec<Symbol>) -> Self {
        Self { store: Mutex::new(symbols), ..Self::default() }
    }

    pub fn gated(self) -> Self {
        self.hold();
        self
    }

    /// Hold every subsequent request until released.
    pub fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Let one held request through.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn fail_next(&self, err: RegistryError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    async fn enter(&self, op: &'static str) -> Result<(), RegistryError> {
        self.calls.lock().unwrap().push(op);
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        match self.fail_with.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn find(&self, id: Uuid) -> Result<Symbol, RegistryError> {
        self.store
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(RegistryError::Response { status: 404, message: "symbol not found".into() })
    }
}

#[async_trait::async_trait]
impl RegistryApi for FakeRegistry {
    async fn list(&self, _team_id: Uuid) -> Result<Vec<Symbol>, RegistryError> {
        self.enter("list").await?;
        Ok(self.store.lock().unwrap().clone())
    }

    async fn create(&self, _team_id: Uuid, body: &NewSymbol) -> Result<Symbol, RegistryError> {
        self.enter("create").await?;
        let mut created = symbol(&body.name, body.scope, ALICE, body.fragment_data.clone());
        created.owner_prototype_id = body.prototype_id;
        self.store.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(&self, _team_id: Uuid, symbol_id: Uuid, patch: &SymbolPatch) -> Result<Symbol, RegistryError> {
        self.enter("update").await?;
        let mut updated = self.find(symbol_id)?;
        if let Some(name) = &patch.name {
            updated.name.clone_from(name);
        }
        if let Some(data) = &patch.fragment_data {
            updated.fragment_data = data.clone();
        }
        let mut store = self.store.lock().unwrap();
        if let Some(slot) = store.iter_mut().find(|s| s.id == symbol_id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    async fn delete(&self, _team_id: Uuid, symbol_id: Uuid) -> Result<(), RegistryError> {
        self.enter("delete").await?;
        self.find(symbol_id)?;
        self.store.lock().unwrap().retain(|s| s.id != symbol_id);
        Ok(())
    }

    async fn promote(&self, _team_id: Uuid, symbol_id: Uuid, target_scope: Scope) -> Result<Symbol, RegistryError> {
        self.enter("promote").await?;
        let source = self.find(symbol_id)?;
        let base = source
            .fragment_id()
            .map(|id| strip_known_prefix(id).clean_id.to_owned())
            .unwrap_or_default();
        let copy = Symbol {
            id: Uuid::new_v4(),
            scope: target_scope,
            owner_prototype_id: None,
            fragment_data: source
                .fragment_data
                .clone()
                .with_id(with_scope_prefix(&base, target_scope)),
            ..source
        };
        self.store.lock().unwrap().push(copy.clone());
        Ok(copy)
    }
}

/// A client for [`TEAM`] already loaded with `symbols`.
pub async fn loaded_client(symbols: Vec<Symbol>) -> (Arc<FakeRegistry>, Arc<RegistryClient>) {
    let api = Arc::new(FakeRegistry::with_symbols(symbols));
    let client = Arc::new(RegistryClient::new(api.clone(), Some(TEAM)));
    client.list().await;
    (api, client)
}

// =============================================================================
// FAKE SESSION
// =============================================================================

#[derive(Default)]
pub struct FakeSession {
    pub mains: Vec<MainDefinition>,
    pub components: HashMap<ComponentId, Value>,
    pub selected: Option<ComponentId>,
    pub fragments: Vec<Fragment>,
    pub staged: HashMap<String, Vec<Value>>,
    pub instances: Vec<(String, Placement)>,
    pub copies: Vec<(Vec<Value>, Placement)>,
    next_id: usize,
}

impl FakeSession {
    pub fn with_main(mut self, id: &str, content: Value) -> Self {
        let component = format!("cmp-{id}");
        self.components.insert(component.clone(), content);
        self.mains.push(MainDefinition { id: id.to_owned(), component });
        self
    }

    pub fn with_component(mut self, id: &str, content: Value) -> Self {
        self.components.insert(id.to_owned(), content);
        self
    }

    pub fn select(mut self, id: &str) -> Self {
        self.selected = Some(id.to_owned());
        self
    }

    fn mint(&mut self) -> ComponentId {
        self.next_id += 1;
        format!("new-{}", self.next_id)
    }
}

impl EditingSession for FakeSession {
    fn main_definitions(&self) -> Vec<MainDefinition> {
        self.mains.clone()
    }

    fn create_instance(&mut self, main_id: &str, placement: &Placement) -> Result<ComponentId, SessionError> {
        if self.find_main(main_id).is_none() {
            return Err(SessionError::MainNotFound(main_id.to_owned()));
        }
        self.instances.push((main_id.to_owned(), placement.clone()));
        Ok(self.mint())
    }

    fn insert_copy(&mut self, content: &[Value], placement: &Placement) -> Result<Vec<ComponentId>, SessionError> {
        if content.is_empty() {
            return Err(SessionError::Rejected("nothing to insert".into()));
        }
        self.copies.push((content.to_vec(), placement.clone()));
        Ok(content.iter().map(|_| self.mint()).collect())
    }

    fn serialize_subtree(&self, component: &str) -> Result<Fragment, SessionError> {
        self.components
            .get(component)
            .cloned()
            .map(Fragment::new)
            .ok_or_else(|| SessionError::ComponentNotFound(component.to_owned()))
    }

    fn selected_component(&self) -> Option<ComponentId> {
        self.selected.clone()
    }

    fn persisted_fragments(&self) -> Vec<Fragment> {
        self.fragments.clone()
    }

    fn replace_persisted_fragments(&mut self, fragments: Vec<Fragment>) {
        self.fragments = fragments;
    }

    fn stage_draggable(&mut self, entry_id: &str, content: Vec<Value>) {
        self.staged.insert(entry_id.to_owned(), content);
    }

    fn remove_draggable(&mut self, entry_id: &str) {
        self.staged.remove(entry_id);
    }
}
