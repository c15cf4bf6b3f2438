//! ChEBI authority collaborator for the refmol reconciliation tools.
//!
//! The external authority is treated as ground truth for identifiers,
//! names and formulae. This crate provides:
//!
//! - the [`AuthorityClient`] trait and the SOAP-backed [`ChebiClient`],
//! - error classification separating per-record faults from systemic
//!   ones (`error`),
//! - the append-only TSV response cache (`cache`),
//! - the bounded-concurrency bulk fetcher (`fetch`).

pub mod cache;
pub mod client;
pub mod error;
pub mod fetch;
pub mod record;

pub use cache::{CacheEntry, FileCache};
pub use client::{AuthorityClient, ChebiClient};
pub use error::{AuthorityError, AuthorityResult};
pub use fetch::{FetchOutcome, FetchTarget, Fetcher};
pub use record::AuthorityRecord;
