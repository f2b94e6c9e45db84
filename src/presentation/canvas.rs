//! Insert-onto-canvas and drag staging.
//!
//! A native fragment whose main definition is live in the session is
//! inserted as a linked instance. Everything else (legacy snapshots, or a
//! native main that has not been loaded yet) falls back to an unlinked copy
//! of the stored content.

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SessionError;
use crate::session::{ComponentId, EditingSession, Placement, default_placement, find_main_for_symbol};
use crate::symbol::Symbol;

/// How a symbol will land in the session.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertPlan {
    Linked { main_id: String },
    Copy { content: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted {
    pub linked: bool,
    pub components: Vec<ComponentId>,
}

#[must_use]
pub fn plan_insert<S: EditingSession + ?Sized>(symbol: &Symbol, session: &S) -> InsertPlan {
    if symbol.fragment_data.is_native() {
        if let Some(main) = find_main_for_symbol(session, symbol) {
            return InsertPlan::Linked { main_id: main.id };
        }
        debug!(symbol_id = %symbol.id, "main not live in session; inserting copy");
    }
    InsertPlan::Copy { content: symbol.fragment_data.copy_content() }
}

fn apply_plan<S: EditingSession + ?Sized>(
    session: &mut S,
    plan: &InsertPlan,
    placement: &Placement,
) -> Result<Inserted, SessionError> {
    match plan {
        InsertPlan::Linked { main_id } => {
            let component = session.create_instance(main_id, placement)?;
            Ok(Inserted { linked: true, components: vec![component] })
        }
        InsertPlan::Copy { content } => {
            let components = session.insert_copy(content, placement)?;
            Ok(Inserted { linked: false, components })
        }
    }
}

/// Insert after the current selection, or at the end of the root container.
///
/// # Errors
///
/// Returns the session's error if it refuses the insertion.
pub fn insert_symbol<S: EditingSession + ?Sized>(symbol: &Symbol, session: &mut S) -> Result<Inserted, SessionError> {
    let plan = plan_insert(symbol, session);
    let placement = default_placement(session);
    let inserted = apply_plan(session, &plan, &placement)?;
    info!(symbol_id = %symbol.id, linked = inserted.linked, "inserted symbol");
    Ok(inserted)
}

// =============================================================================
// DRAG
// =============================================================================

/// A transient draggable entry for one drag gesture.
///
/// The entry is removed from the session when the drag completes, is
/// cancelled, or the stage is dropped without either.
pub struct DragStage<'s, S: EditingSession + ?Sized> {
    session: &'s mut S,
    entry_id: String,
    plan: InsertPlan,
    symbol_id: Uuid,
}

impl<'s, S: EditingSession + ?Sized> DragStage<'s, S> {
    pub fn begin(symbol: &Symbol, session: &'s mut S) -> Self {
        let plan = plan_insert(symbol, session);
        let entry_id = format!("symbol-drag-{}", Uuid::new_v4());
        session.stage_draggable(&entry_id, symbol.fragment_data.copy_content());
        debug!(symbol_id = %symbol.id, %entry_id, "staged draggable");
        Self { session, entry_id, plan, symbol_id: symbol.id }
    }

    #[must_use]
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    #[must_use]
    pub fn plan(&self) -> &InsertPlan {
        &self.plan
    }

    /// Drop onto the canvas. `None` uses the default placement.
    ///
    /// # Errors
    ///
    /// Returns the session's error if it refuses the insertion. The staged
    /// entry is removed either way.
    pub fn complete(mut self, placement: Option<Placement>) -> Result<Inserted, SessionError> {
        let placement = placement.unwrap_or_else(|| default_placement(&*self.session));
        let result = apply_plan(&mut *self.session, &self.plan, &placement);
        info!(symbol_id = %self.symbol_id, ok = result.is_ok(), "drag completed");
        result
    }

    pub fn cancel(self) {
        debug!(symbol_id = %self.symbol_id, "drag abandoned");
    }
}

impl<S: EditingSession + ?Sized> Drop for DragStage<'_, S> {
    fn drop(&mut self) {
        self.session.remove_draggable(&self.entry_id);
    }
}
