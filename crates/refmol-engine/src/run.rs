//! Run orchestration.
//!
//! Drives the fixed phase sequence: pre-check, fetch, reconcile,
//! commit-or-rollback, post-check. A single transaction wraps the
//! reconciliation loop; the duplicate checks run outside it.

use std::collections::BTreeMap;
use std::sync::Arc;

use refmol_authority::{FetchTarget, Fetcher};
use refmol_store::models::Molecule;
use refmol_store::MoleculeStore;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::duplicates::detect_duplicates;
use crate::error::{EngineError, EngineResult};
use crate::events::ChangeEvent;
use crate::reconcile::Reconciler;
use crate::report::{Category, ChangeReport};

/// Note attached to the run's audit record.
pub const AUDIT_NOTE: &str = "refmol chemical-entity reconciliation";

/// Run-level configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the authority's reference database in the store.
    pub database_name: String,
    /// Person the run's audit record is attributed to.
    pub person_id: i64,
    /// Roll back all writes at the end instead of committing.
    pub dry_run: bool,
}

/// Per-run counters, rendered at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub molecules_considered: usize,
    pub retrieved: usize,
    pub failed: usize,
    pub identifier_drifts: usize,
    pub name_changes: usize,
    pub formula_fills: usize,
    pub formula_changes: usize,
    pub referrer_name_changes: usize,
    pub duplicates_before: usize,
    pub duplicates_after: usize,
    pub data_errors: usize,
    pub dry_run: bool,
}

/// Everything a run produces.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: ChangeReport,
    pub summary: RunSummary,
}

/// Drives one reconciliation run end to end.
pub struct RunCoordinator {
    store: Arc<dyn MoleculeStore>,
    fetcher: Fetcher,
    config: RunConfig,
}

impl RunCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn MoleculeStore>, fetcher: Fetcher, config: RunConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    /// Execute the run.
    ///
    /// Returns `Err` only for systemic faults; in that case nothing
    /// was committed.
    pub async fn run(&self) -> EngineResult<RunOutcome> {
        let database_id = self
            .store
            .reference_database_id(&self.config.database_name)
            .await?
            .ok_or_else(|| EngineError::MissingReferenceDatabase {
                name: self.config.database_name.clone(),
            })?;

        let molecules = self.store.molecules_for_database(database_id).await?;
        info!(
            database = %self.config.database_name,
            molecules = molecules.len(),
            dry_run = self.config.dry_run,
            "reconciliation run starting"
        );

        let mut report = ChangeReport::new();

        info!("checking for duplicate identifiers before reconciliation");
        for event in detect_duplicates(&molecules) {
            report.record(event);
        }
        let duplicates_before = report.count(Category::Duplicate);

        let targets: Vec<FetchTarget> = molecules
            .iter()
            .map(|m| FetchTarget {
                id: m.id,
                identifier: m.identifier.clone(),
                label: m.label(),
            })
            .collect();
        let outcome = self.fetcher.fetch_all(targets).await?;

        let by_id: BTreeMap<i64, &Molecule> = molecules.iter().map(|m| (m.id, m)).collect();
        for (molecule_id, reason) in &outcome.failures {
            report.record(ChangeEvent::FetchFailure {
                molecule_id: *molecule_id,
                label: by_id
                    .get(molecule_id)
                    .map_or_else(|| format!("Molecule#{molecule_id}"), |m| m.label()),
                reason: reason.clone(),
            });
        }

        self.store.begin_transaction().await?;
        let applied = self.apply(&by_id, &outcome.records, &mut report).await;
        match applied {
            Ok(()) if self.config.dry_run => {
                info!("dry run, rolling back all changes");
                self.store.rollback().await?;
            }
            Ok(()) => {
                self.store.commit().await?;
                info!("changes committed");
            }
            Err(e) => {
                if let Err(rollback_err) = self.store.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed run also failed");
                }
                return Err(e);
            }
        }

        info!("checking for duplicate identifiers after reconciliation");
        let after = self.store.molecules_for_database(database_id).await?;
        for event in detect_duplicates(&after) {
            report.record(event);
        }
        let duplicates_after = report.count(Category::Duplicate) - duplicates_before;

        let summary = RunSummary {
            molecules_considered: molecules.len(),
            retrieved: outcome.records.len(),
            failed: outcome.failures.len(),
            identifier_drifts: report.count(Category::IdentifierDrift),
            name_changes: report.count(Category::NameChange),
            formula_fills: report.count(Category::FormulaFill),
            formula_changes: report.count(Category::FormulaChange),
            referrer_name_changes: report.count(Category::ReferrerNameChange),
            duplicates_before,
            duplicates_after,
            data_errors: report.count(Category::DataError),
            dry_run: self.config.dry_run,
        };
        info!(
            retrieved = summary.retrieved,
            failed = summary.failed,
            "reconciliation run finished"
        );
        Ok(RunOutcome { report, summary })
    }

    /// The transactional part: audit record plus the per-record loop.
    ///
    /// Store errors on a single record are logged and the record is
    /// skipped; only errors outside the loop abort the run.
    async fn apply(
        &self,
        by_id: &BTreeMap<i64, &Molecule>,
        records: &std::collections::HashMap<i64, refmol_authority::AuthorityRecord>,
        report: &mut ChangeReport,
    ) -> EngineResult<()> {
        let audit_id = self
            .store
            .create_audit_record(self.config.person_id, AUDIT_NOTE)
            .await?;
        let reconciler = Reconciler::new(self.store.as_ref(), audit_id);

        // Deterministic order: ascending molecule id.
        for (molecule_id, molecule) in by_id {
            let Some(record) = records.get(molecule_id) else {
                continue;
            };
            if let Err(e) = reconciler.reconcile(molecule, record, report).await {
                error!(molecule = molecule_id, error = %e, "skipping record after store error");
                report.record(ChangeEvent::DataError {
                    subject_id: *molecule_id,
                    label: molecule.label(),
                    message: format!("reconciliation aborted for this record: {e}"),
                });
            }
        }
        Ok(())
    }
}
