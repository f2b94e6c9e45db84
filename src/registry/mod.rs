//! Symbol registry: the server API seam and the cached client over it.
//!
//! DESIGN
//! ======
//! `RegistryApi` is the transport boundary. `HttpRegistry` implements it
//! over reqwest; tests swap in fakes. `RegistryClient` owns the in-memory
//! snapshot for one team and is the only writer of that snapshot.

pub mod api;
pub mod client;

pub use api::{HttpRegistry, RegistryApi};
pub use client::{RegistryClient, SessionFragment};
