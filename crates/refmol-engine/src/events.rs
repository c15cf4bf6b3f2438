//! Change events emitted during a reconciliation run.
//!
//! Events are immutable once created; the reporter owns them after
//! emission and never hands out mutable access.

use refmol_store::models::Person;

/// A molecule already holding the identifier another molecule is
/// drifting towards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub molecule_id: i64,
    pub label: String,
    pub referrer_ids: Vec<i64>,
}

/// One applied or detected change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The authority's canonical identifier differs from the stored
    /// one. Report-only; the store is never auto-corrected.
    IdentifierDrift {
        molecule_id: i64,
        label: String,
        stored_identifier: String,
        authority_identifier: String,
        referrer_ids: Vec<i64>,
        /// Another molecule already holding the authority identifier,
        /// if one exists; curators merge these by hand.
        collision: Option<Collision>,
    },

    /// The primary name was overwritten with the authority's.
    NameChange {
        molecule_id: i64,
        label: String,
        old_name: String,
        new_name: String,
    },

    /// A previously empty formula was filled in.
    FormulaFill {
        molecule_id: i64,
        label: String,
        formula: String,
    },

    /// A stored formula was overwritten with a different one. A
    /// blank authority formula clears the field silently (warn only),
    /// so it never shows up here.
    FormulaChange {
        molecule_id: i64,
        label: String,
        old_formula: String,
        new_formula: String,
    },

    /// An authority name was merged into a referrer's name list.
    ReferrerNameChange {
        referrer_id: i64,
        label: String,
        molecule_id: i64,
        authority_name: String,
        /// The full name list after the merge.
        names: Vec<String>,
        /// Provenance of the referrer, when resolvable.
        creator: Option<Person>,
    },

    /// An identifier held by more than one molecule, including the
    /// null-identifier bucket.
    Duplicate {
        identifier: Option<String>,
        molecule_ids: Vec<i64>,
        labels: Vec<String>,
    },

    /// A record excluded from reconciliation by a retrieval failure.
    FetchFailure {
        molecule_id: i64,
        label: String,
        reason: String,
    },

    /// A data-quality fault found while reconciling one record.
    DataError {
        subject_id: i64,
        label: String,
        message: String,
    },
}
