//! The persistence seam the reconciliation engine depends on.
//!
//! Mirrors the primitives the engine needs from a connected store:
//! query-by-attribute, fetch-by-id, attribute writes, referrer lookup,
//! audit-record creation and transaction control. The transaction is
//! carried by the store handle itself: after `begin_transaction`, all
//! reads and writes go through the open transaction until `commit` or
//! `rollback`.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{Molecule, Person, Referrer};

/// Storage operations over reference molecules and their referrers.
#[async_trait]
pub trait MoleculeStore: Send + Sync {
    /// Look up a reference database by name.
    async fn reference_database_id(&self, name: &str) -> StoreResult<Option<i64>>;

    /// All molecules sourced from the given reference database.
    async fn molecules_for_database(
        &self,
        reference_database_id: i64,
    ) -> StoreResult<Vec<Molecule>>;

    /// Fetch one molecule by id.
    async fn molecule(&self, id: i64) -> StoreResult<Option<Molecule>>;

    /// Molecules of the given reference database holding the given
    /// identifier. Duplicates are a data-quality fault, so this may
    /// return more than one row.
    async fn molecules_with_identifier(
        &self,
        reference_database_id: i64,
        identifier: &str,
    ) -> StoreResult<Vec<Molecule>>;

    /// Entities referring to the given molecule.
    ///
    /// Read fresh on every call; the engine relies on this inside the
    /// reconciliation loop to observe its own writes.
    async fn referrers_of(&self, molecule_id: i64) -> StoreResult<Vec<Referrer>>;

    /// Resolve the creator of a referrer from its creation audit
    /// trail, if one is recorded.
    async fn creator_of_referrer(&self, referrer_id: i64) -> StoreResult<Option<Person>>;

    /// Replace a molecule's ordered name list.
    async fn update_molecule_names(&self, id: i64, names: &[String]) -> StoreResult<()>;

    /// Replace a molecule's formula. `None` clears it.
    async fn update_molecule_formula(&self, id: i64, formula: Option<&str>) -> StoreResult<()>;

    /// Persist a molecule's derived display label.
    async fn update_molecule_display_name(&self, id: i64, display_name: &str) -> StoreResult<()>;

    /// Replace a referrer's ordered name list.
    async fn update_referrer_names(&self, id: i64, names: &[String]) -> StoreResult<()>;

    /// Create the audit record for a run.
    ///
    /// Returns the new record's id. Called once per run, inside the
    /// run's transaction.
    async fn create_audit_record(&self, person_id: i64, note: &str) -> StoreResult<i64>;

    /// Append an audit record to a molecule's modified history.
    async fn attach_molecule_modified(&self, molecule_id: i64, audit_id: i64) -> StoreResult<()>;

    /// Append an audit record to a referrer's modified history.
    async fn attach_referrer_modified(&self, referrer_id: i64, audit_id: i64) -> StoreResult<()>;

    /// Open the run transaction. Fails if one is already open.
    async fn begin_transaction(&self) -> StoreResult<()>;

    /// Commit the open transaction.
    async fn commit(&self) -> StoreResult<()>;

    /// Roll back the open transaction, discarding every write made
    /// since `begin_transaction`.
    async fn rollback(&self) -> StoreResult<()>;
}
