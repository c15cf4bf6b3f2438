//! Reconciliation engine for curated chemical-entity records.
//!
//! Reconciles molecules in the curated store against the external
//! authority: diffing policy per record (`reconcile`), the referrer
//! name-merge rule (`names`), duplicate identifier detection
//! (`duplicates`), structured change reporting (`report`) and the
//! phase-sequenced run coordinator (`run`).

pub mod duplicates;
pub mod error;
pub mod events;
pub mod names;
pub mod reconcile;
pub mod report;
pub mod run;

pub use duplicates::detect_duplicates;
pub use error::{EngineError, EngineResult};
pub use events::{ChangeEvent, Collision};
pub use reconcile::Reconciler;
pub use report::{Category, ChangeReport};
pub use run::{RunConfig, RunCoordinator, RunOutcome, RunSummary};
