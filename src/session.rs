//! Editing session capability.
//!
//! The visual editing engine is external. This crate only calls into it
//! through [`EditingSession`], so reconciliation and canvas insertion can be
//! exercised against an in-memory session. How the engine propagates edits
//! from a main definition to its instances is its own business.

use serde_json::Value;

use crate::error::SessionError;
use crate::fragment::Fragment;
use crate::scope::strip_known_prefix;
use crate::symbol::Symbol;

/// Engine-assigned component identifier.
pub type ComponentId = String;

/// Where new content lands on the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Immediately after an existing component, as its next sibling.
    After(ComponentId),
    /// Appended to the primary content container.
    AppendToRoot,
}

/// A live main definition known to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainDefinition {
    /// Session fragment id (prefixed for registry-backed mains).
    pub id: String,
    /// Root component of the definition.
    pub component: ComponentId,
}

pub trait EditingSession {
    /// All main definitions currently live in the session.
    fn main_definitions(&self) -> Vec<MainDefinition>;

    fn find_main(&self, id: &str) -> Option<MainDefinition> {
        self.main_definitions().into_iter().find(|m| m.id == id)
    }

    /// Create an instance linked to `main_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the main is gone or the engine refuses.
    fn create_instance(&mut self, main_id: &str, placement: &Placement) -> Result<ComponentId, SessionError>;

    /// Insert unlinked copies of `content`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the engine refuses the content.
    fn insert_copy(&mut self, content: &[Value], placement: &Placement) -> Result<Vec<ComponentId>, SessionError>;

    /// Serialize a component subtree to a fragment payload.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ComponentNotFound`] for unknown components.
    fn serialize_subtree(&self, component: &str) -> Result<Fragment, SessionError>;

    fn selected_component(&self) -> Option<ComponentId>;

    /// The fragment list stored with the document.
    fn persisted_fragments(&self) -> Vec<Fragment>;

    fn replace_persisted_fragments(&mut self, fragments: Vec<Fragment>);

    /// Register a transient draggable entry carrying `content`.
    fn stage_draggable(&mut self, entry_id: &str, content: Vec<Value>);

    fn remove_draggable(&mut self, entry_id: &str);
}

/// Find the live main definition backing `symbol`.
///
/// The scope-derived session key wins. The stored id as-is comes next, and
/// only then a main whose id matches once scope prefixes are stripped, so a
/// promoted pair such as `team-abc` / `org-abc` never resolves across scopes.
pub fn find_main_for_symbol<S: EditingSession + ?Sized>(session: &S, symbol: &Symbol) -> Option<MainDefinition> {
    let fragment_id = symbol.fragment_id()?;
    symbol
        .session_id()
        .and_then(|key| session.find_main(&key))
        .or_else(|| session.find_main(fragment_id))
        .or_else(|| find_main_by_stripped_id(session, fragment_id))
}

/// Find the live main for a fragment id, comparing ids with their scope
/// prefix stripped.
pub fn find_main_by_stripped_id<S: EditingSession + ?Sized>(session: &S, fragment_id: &str) -> Option<MainDefinition> {
    let wanted = strip_known_prefix(fragment_id).clean_id;
    session
        .main_definitions()
        .into_iter()
        .find(|m| strip_known_prefix(&m.id).clean_id == wanted)
}

/// Placement after the current selection, or at the end of the root.
pub fn default_placement<S: EditingSession + ?Sized>(session: &S) -> Placement {
    session
        .selected_component()
        .map_or(Placement::AppendToRoot, Placement::After)
}
