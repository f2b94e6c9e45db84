//! Presentation layer: grouped listing, permission-gated item actions, and
//! canvas insertion.
//!
//! ARCHITECTURE
//! ============
//! `permission` is pure policy. `controller` owns per-item action state and
//! the error banner, and drives the registry client. `canvas` resolves how a
//! symbol lands in the editing session (linked instance or copy).

pub mod canvas;
pub mod controller;
pub mod permission;

pub use canvas::{DragStage, InsertPlan, Inserted, insert_symbol, plan_insert};
pub use controller::{ErrorBanner, ItemState, Outcome, PresentationController, SymbolGroup, group_symbols};
pub use permission::{Actor, ItemAction, Role, available_actions, can_edit, creatable_scopes, promotion_targets};
