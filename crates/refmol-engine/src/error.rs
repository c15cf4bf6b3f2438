//! Engine error types.

use refmol_authority::AuthorityError;
use refmol_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that abort a reconciliation run.
///
/// Per-record faults never surface here; they end up in the change
/// report. Anything that does surface means no transaction was
/// committed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The authority's reference database is not registered in the
    /// store. Raised before any other work proceeds.
    #[error("reference database \"{name}\" not found in the store")]
    MissingReferenceDatabase { name: String },

    /// A store operation failed outside the per-record loop.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The retrieval pass hit a systemic authority fault.
    #[error(transparent)]
    Authority(#[from] AuthorityError),
}
