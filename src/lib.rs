//! Symbol sync: reusable design fragments shared across prototypes, teams and
//! organizations.
//!
//! DESIGN
//! ======
//! - `scope`: id prefixes that encode a symbol's sharing scope.
//! - `fragment`: payload format detection (native tree vs legacy wrapper).
//! - `registry`: HTTP seam plus the cached per-team client.
//! - `reconcile`: merge registry symbols into a stored document and strip
//!   them back out before persisting.
//! - `session`: the editing engine boundary.
//! - `presentation`: grouped listing, permissions, item actions and canvas
//!   insertion.
//!
//! Everything that talks to the network goes through `registry::RegistryApi`,
//! so the rest of the crate runs against in-memory fakes in tests.

pub mod config;
pub mod error;
pub mod fragment;
pub mod presentation;
pub mod reconcile;
pub mod registry;
pub mod scope;
pub mod session;
pub mod symbol;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ErrorCode, RegistryError, SessionError};
pub use fragment::Fragment;
pub use scope::Scope;
pub use symbol::Symbol;
