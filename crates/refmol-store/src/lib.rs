//! Persistence layer for the refmol reconciliation tools.
//!
//! The curated store holds reference molecules sourced from an external
//! authority (ChEBI), the entities that refer to them, and the audit
//! trail of every modification. This crate exposes:
//!
//! - the data model (`models`),
//! - the [`MoleculeStore`] trait, the seam the reconciliation engine
//!   depends on,
//! - a Postgres implementation (`postgres`) with embedded migrations,
//! - an in-memory implementation (`memory`) with snapshot transactions,
//!   used by tests and local experimentation.

pub mod bootstrap;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{AuditRecord, Molecule, Person, Referrer};
pub use postgres::PgMoleculeStore;
pub use store::MoleculeStore;
