//! Edit permission and promotion eligibility.
//!
//! A failed gate never produces an error: the action is simply not offered.

#[cfg(test)]
#[path = "permission_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::Scope;
use crate::symbol::Symbol;

/// The caller's role within the current team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Member,
    TeamAdmin,
    OrgAdmin,
}

/// Identity and authorization context. Read-only input to every gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    /// `None` when unauthenticated.
    pub user_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub fn is_org_admin(&self) -> bool {
        self.role == Role::OrgAdmin
    }

    #[must_use]
    pub fn is_team_admin(&self) -> bool {
        self.role == Role::TeamAdmin
    }

    fn is_creator_of(&self, symbol: &Symbol) -> bool {
        self.user_id == Some(symbol.created_by)
    }
}

/// Actions a list item can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Insert,
    Rename,
    Delete,
    Promote(Scope),
    LibrarySave,
}

#[must_use]
pub fn can_edit(symbol: &Symbol, actor: &Actor) -> bool {
    if actor.user_id.is_none() {
        return false;
    }
    match symbol.scope {
        Scope::Organization => actor.is_creator_of(symbol) || actor.is_org_admin(),
        Scope::Prototype | Scope::Team => {
            actor.is_creator_of(symbol) || actor.is_team_admin() || actor.is_org_admin()
        }
    }
}

/// Broader scopes this symbol may be copied to by `actor`.
#[must_use]
pub fn promotion_targets(symbol: &Symbol, actor: &Actor) -> Vec<Scope> {
    if actor.user_id.is_none() {
        return Vec::new();
    }
    let org_allowed = actor.is_org_admin() && actor.organization_id.is_some();
    match symbol.scope {
        Scope::Prototype => {
            let mut targets = vec![Scope::Team];
            if org_allowed {
                targets.push(Scope::Organization);
            }
            targets
        }
        Scope::Team if org_allowed => vec![Scope::Organization],
        Scope::Team | Scope::Organization => Vec::new(),
    }
}

/// Scopes `actor` may create a new symbol in. Prototype scope needs an open
/// prototype; organization scope follows the promotion rule.
#[must_use]
pub fn creatable_scopes(actor: &Actor, has_prototype: bool) -> Vec<Scope> {
    if actor.user_id.is_none() {
        return Vec::new();
    }
    let mut scopes = Vec::with_capacity(3);
    if has_prototype {
        scopes.push(Scope::Prototype);
    }
    scopes.push(Scope::Team);
    if actor.is_org_admin() && actor.organization_id.is_some() {
        scopes.push(Scope::Organization);
    }
    scopes
}

/// Everything the item menu offers. Insert is always available; the rest
/// require edit permission.
#[must_use]
pub fn available_actions(symbol: &Symbol, actor: &Actor) -> Vec<ItemAction> {
    let mut actions = vec![ItemAction::Insert];
    if !can_edit(symbol, actor) {
        return actions;
    }
    actions.extend([ItemAction::Rename, ItemAction::LibrarySave, ItemAction::Delete]);
    actions.extend(
        promotion_targets(symbol, actor)
            .into_iter()
            .map(ItemAction::Promote),
    );
    actions
}
