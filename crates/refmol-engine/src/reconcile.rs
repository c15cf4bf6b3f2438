//! Per-record reconciliation policy.
//!
//! Applies a fixed sequence of steps to one molecule and its freshly
//! fetched authority record: identifier-drift detection (report only),
//! name reconciliation, formula reconciliation, referrer propagation
//! and display-label refresh. Every mutation attaches the run's audit
//! record to the entity's modified history before the write.

use refmol_authority::AuthorityRecord;
use refmol_store::models::Molecule;
use refmol_store::{MoleculeStore, StoreResult};
use tracing::{debug, warn};

use crate::events::{ChangeEvent, Collision};
use crate::names;
use crate::report::ChangeReport;

/// Reconciles one molecule at a time against authority records.
pub struct Reconciler<'a> {
    store: &'a dyn MoleculeStore,
    audit_id: i64,
}

impl<'a> Reconciler<'a> {
    /// `audit_id` is the run's audit record, already created inside
    /// the run transaction.
    #[must_use]
    pub fn new(store: &'a dyn MoleculeStore, audit_id: i64) -> Self {
        Self { store, audit_id }
    }

    /// Apply the reconciliation steps for one molecule.
    ///
    /// Store errors bubble up so the caller can log and skip the
    /// record; events already emitted for earlier steps stay in the
    /// report.
    pub async fn reconcile(
        &self,
        molecule: &Molecule,
        authority: &AuthorityRecord,
        report: &mut ChangeReport,
    ) -> StoreResult<()> {
        self.detect_identifier_drift(molecule, authority, report)
            .await?;

        let mut updated = molecule.clone();
        let mut audit_attached = false;

        let name_changed = self
            .reconcile_name(&mut updated, authority, report, &mut audit_attached)
            .await?;
        let formula_changed = self
            .reconcile_formula(&mut updated, authority, report, &mut audit_attached)
            .await?;

        if name_changed {
            self.propagate_to_referrers(&updated, &authority.ascii_name, report)
                .await?;
        }

        if name_changed || formula_changed {
            self.store
                .update_molecule_display_name(updated.id, &updated.derived_display_name())
                .await?;
        }
        Ok(())
    }

    async fn attach_molecule_audit(
        &self,
        molecule_id: i64,
        attached: &mut bool,
    ) -> StoreResult<()> {
        if !*attached {
            self.store
                .attach_molecule_modified(molecule_id, self.audit_id)
                .await?;
            *attached = true;
        }
        Ok(())
    }

    /// Step 1: report identifier drift. Never mutates the store.
    async fn detect_identifier_drift(
        &self,
        molecule: &Molecule,
        authority: &AuthorityRecord,
        report: &mut ChangeReport,
    ) -> StoreResult<()> {
        let canonical = authority.canonical_id();
        let stored = molecule.identifier.as_deref().unwrap_or("");
        if stored == canonical {
            return Ok(());
        }

        let referrer_ids: Vec<i64> = self
            .store
            .referrers_of(molecule.id)
            .await?
            .iter()
            .map(|r| r.id)
            .collect();

        // A molecule already holding the new identifier means the pair
        // needs a manual merge; surface both referrer sets.
        let mut collision = None;
        for other in self
            .store
            .molecules_with_identifier(molecule.reference_database_id, canonical)
            .await?
        {
            if other.id == molecule.id {
                continue;
            }
            let other_referrers: Vec<i64> = self
                .store
                .referrers_of(other.id)
                .await?
                .iter()
                .map(|r| r.id)
                .collect();
            collision = Some(Collision {
                molecule_id: other.id,
                label: other.label(),
                referrer_ids: other_referrers,
            });
            break;
        }

        warn!(
            molecule = molecule.id,
            stored, authority = canonical,
            "identifier drift detected, not auto-corrected"
        );
        report.record(ChangeEvent::IdentifierDrift {
            molecule_id: molecule.id,
            label: molecule.label(),
            stored_identifier: stored.to_string(),
            authority_identifier: canonical.to_string(),
            referrer_ids,
            collision,
        });
        Ok(())
    }

    /// Step 2: overwrite the primary name when it drifted.
    async fn reconcile_name(
        &self,
        molecule: &mut Molecule,
        authority: &AuthorityRecord,
        report: &mut ChangeReport,
        audit_attached: &mut bool,
    ) -> StoreResult<bool> {
        if molecule.primary_name() == Some(authority.ascii_name.as_str()) {
            return Ok(false);
        }

        let old_name = molecule.primary_name().unwrap_or("").to_string();
        if molecule.names.is_empty() {
            molecule.names.push(authority.ascii_name.clone());
        } else {
            molecule.names[0] = authority.ascii_name.clone();
        }

        self.attach_molecule_audit(molecule.id, audit_attached).await?;
        self.store
            .update_molecule_names(molecule.id, &molecule.names)
            .await?;
        debug!(molecule = molecule.id, old = %old_name, new = %authority.ascii_name, "primary name updated");
        report.record(ChangeEvent::NameChange {
            molecule_id: molecule.id,
            label: molecule.label(),
            old_name,
            new_name: authority.ascii_name.clone(),
        });
        Ok(true)
    }

    /// Step 3: fill, update or clear the formula.
    async fn reconcile_formula(
        &self,
        molecule: &mut Molecule,
        authority: &AuthorityRecord,
        report: &mut ChangeReport,
        audit_attached: &mut bool,
    ) -> StoreResult<bool> {
        // No formula list at all means the authority has nothing to
        // say; a present-but-blank entry is an authoritative absence.
        let Some(authority_formula) = authority.primary_formula() else {
            return Ok(false);
        };
        let authority_formula = authority_formula.trim();

        match (&molecule.formula, authority_formula.is_empty()) {
            (None, true) => Ok(false),
            (None, false) => {
                self.attach_molecule_audit(molecule.id, audit_attached).await?;
                self.store
                    .update_molecule_formula(molecule.id, Some(authority_formula))
                    .await?;
                molecule.formula = Some(authority_formula.to_string());
                report.record(ChangeEvent::FormulaFill {
                    molecule_id: molecule.id,
                    label: molecule.label(),
                    formula: authority_formula.to_string(),
                });
                Ok(true)
            }
            (Some(stored), true) => {
                warn!(
                    molecule = molecule.id,
                    stored = %stored,
                    "authority carries no formula, clearing stored value"
                );
                self.attach_molecule_audit(molecule.id, audit_attached).await?;
                self.store.update_molecule_formula(molecule.id, None).await?;
                molecule.formula = None;
                Ok(true)
            }
            (Some(stored), false) => {
                if stored == authority_formula {
                    return Ok(false);
                }
                let old_formula = stored.clone();
                self.attach_molecule_audit(molecule.id, audit_attached).await?;
                self.store
                    .update_molecule_formula(molecule.id, Some(authority_formula))
                    .await?;
                molecule.formula = Some(authority_formula.to_string());
                report.record(ChangeEvent::FormulaChange {
                    molecule_id: molecule.id,
                    label: molecule.label(),
                    old_formula,
                    new_formula: authority_formula.to_string(),
                });
                Ok(true)
            }
        }
    }

    /// Step 4: merge the new authority name into every referrer.
    ///
    /// Referrers are read fresh here, not captured during fetch.
    async fn propagate_to_referrers(
        &self,
        molecule: &Molecule,
        authority_name: &str,
        report: &mut ChangeReport,
    ) -> StoreResult<()> {
        for referrer in self.store.referrers_of(molecule.id).await? {
            if referrer.names.is_empty() {
                warn!(referrer = referrer.id, "referrer has an empty name list");
                report.record(ChangeEvent::DataError {
                    subject_id: referrer.id,
                    label: referrer.label(),
                    message: "referrer has an empty name list".to_string(),
                });
                continue;
            }
            let Some(merged) = names::merge_authority_name(&referrer.names, authority_name) else {
                continue;
            };

            self.store
                .attach_referrer_modified(referrer.id, self.audit_id)
                .await?;
            self.store
                .update_referrer_names(referrer.id, &merged)
                .await?;

            let creator = match self.store.creator_of_referrer(referrer.id).await {
                Ok(creator) => creator,
                Err(e) => {
                    warn!(referrer = referrer.id, error = %e, "could not resolve referrer creator");
                    None
                }
            };
            report.record(ChangeEvent::ReferrerNameChange {
                referrer_id: referrer.id,
                label: referrer.label(),
                molecule_id: molecule.id,
                authority_name: authority_name.to_string(),
                names: merged,
                creator,
            });
        }
        Ok(())
    }
}
