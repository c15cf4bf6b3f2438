//! In-memory implementation of [`MoleculeStore`].
//!
//! Transactions are snapshot-based: `begin_transaction` clones the
//! committed state, writes land on the clone, `commit` promotes it and
//! `rollback` discards it. Used by the engine's tests and for local
//! experimentation without a database.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::models::{AuditRecord, Molecule, Person, Referrer};
use crate::store::MoleculeStore;

#[derive(Debug, Clone, Default)]
struct Data {
    reference_databases: HashMap<String, i64>,
    molecules: BTreeMap<i64, Molecule>,
    referrers: BTreeMap<i64, Referrer>,
    persons: HashMap<i64, Person>,
    /// referrer id -> creator person id
    referrer_creators: HashMap<i64, i64>,
    audits: Vec<AuditRecord>,
    molecule_modified: HashMap<i64, Vec<i64>>,
    referrer_modified: HashMap<i64, Vec<i64>>,
    next_audit_id: i64,
}

#[derive(Debug, Default)]
struct State {
    committed: Data,
    /// Clone of `committed` while a transaction is open.
    working: Option<Data>,
}

impl State {
    fn view(&self) -> &Data {
        self.working.as_ref().unwrap_or(&self.committed)
    }

    fn view_mut(&mut self) -> &mut Data {
        self.working.as_mut().unwrap_or(&mut self.committed)
    }
}

/// In-memory store with snapshot transactions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reference database and return its id.
    pub async fn add_reference_database(&self, id: i64, name: &str) {
        let mut state = self.state.write().await;
        state
            .view_mut()
            .reference_databases
            .insert(name.to_string(), id);
    }

    /// Insert a molecule.
    pub async fn add_molecule(&self, molecule: Molecule) {
        let mut state = self.state.write().await;
        state.view_mut().molecules.insert(molecule.id, molecule);
    }

    /// Insert a referrer.
    pub async fn add_referrer(&self, referrer: Referrer) {
        let mut state = self.state.write().await;
        state.view_mut().referrers.insert(referrer.id, referrer);
    }

    /// Insert a person.
    pub async fn add_person(&self, person: Person) {
        let mut state = self.state.write().await;
        state.view_mut().persons.insert(person.id, person);
    }

    /// Record that `referrer_id` was created by `person_id`.
    pub async fn set_referrer_creator(&self, referrer_id: i64, person_id: i64) {
        let mut state = self.state.write().await;
        state
            .view_mut()
            .referrer_creators
            .insert(referrer_id, person_id);
    }

    /// Current referrer state, for test assertions.
    pub async fn referrer(&self, id: i64) -> Option<Referrer> {
        let state = self.state.read().await;
        state.view().referrers.get(&id).cloned()
    }

    /// Audit records attached to a molecule's modified history.
    pub async fn molecule_modified(&self, molecule_id: i64) -> Vec<i64> {
        let state = self.state.read().await;
        state
            .view()
            .molecule_modified
            .get(&molecule_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Audit records attached to a referrer's modified history.
    pub async fn referrer_modified(&self, referrer_id: i64) -> Vec<i64> {
        let state = self.state.read().await;
        state
            .view()
            .referrer_modified
            .get(&referrer_id)
            .cloned()
            .unwrap_or_default()
    }

    /// All audit records created so far.
    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        let state = self.state.read().await;
        state.view().audits.clone()
    }
}

#[async_trait]
impl MoleculeStore for MemoryStore {
    async fn reference_database_id(&self, name: &str) -> StoreResult<Option<i64>> {
        let state = self.state.read().await;
        Ok(state.view().reference_databases.get(name).copied())
    }

    async fn molecules_for_database(
        &self,
        reference_database_id: i64,
    ) -> StoreResult<Vec<Molecule>> {
        let state = self.state.read().await;
        Ok(state
            .view()
            .molecules
            .values()
            .filter(|m| m.reference_database_id == reference_database_id)
            .cloned()
            .collect())
    }

    async fn molecule(&self, id: i64) -> StoreResult<Option<Molecule>> {
        let state = self.state.read().await;
        Ok(state.view().molecules.get(&id).cloned())
    }

    async fn molecules_with_identifier(
        &self,
        reference_database_id: i64,
        identifier: &str,
    ) -> StoreResult<Vec<Molecule>> {
        let state = self.state.read().await;
        Ok(state
            .view()
            .molecules
            .values()
            .filter(|m| {
                m.reference_database_id == reference_database_id
                    && m.identifier.as_deref() == Some(identifier)
            })
            .cloned()
            .collect())
    }

    async fn referrers_of(&self, molecule_id: i64) -> StoreResult<Vec<Referrer>> {
        let state = self.state.read().await;
        Ok(state
            .view()
            .referrers
            .values()
            .filter(|r| r.molecule_id == molecule_id)
            .cloned()
            .collect())
    }

    async fn creator_of_referrer(&self, referrer_id: i64) -> StoreResult<Option<Person>> {
        let state = self.state.read().await;
        let data = state.view();
        Ok(data
            .referrer_creators
            .get(&referrer_id)
            .and_then(|person_id| data.persons.get(person_id))
            .cloned())
    }

    async fn update_molecule_names(&self, id: i64, names: &[String]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let molecule = state
            .view_mut()
            .molecules
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("molecule {id}")))?;
        molecule.names = names.to_vec();
        Ok(())
    }

    async fn update_molecule_formula(&self, id: i64, formula: Option<&str>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let molecule = state
            .view_mut()
            .molecules
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("molecule {id}")))?;
        molecule.formula = formula.map(str::to_string);
        Ok(())
    }

    async fn update_molecule_display_name(&self, id: i64, display_name: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let molecule = state
            .view_mut()
            .molecules
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("molecule {id}")))?;
        molecule.display_name = Some(display_name.to_string());
        Ok(())
    }

    async fn update_referrer_names(&self, id: i64, names: &[String]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let referrer = state
            .view_mut()
            .referrers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("referrer {id}")))?;
        referrer.names = names.to_vec();
        Ok(())
    }

    async fn create_audit_record(&self, person_id: i64, note: &str) -> StoreResult<i64> {
        let mut state = self.state.write().await;
        let data = state.view_mut();
        data.next_audit_id += 1;
        let id = data.next_audit_id;
        data.audits.push(AuditRecord {
            id,
            person_id,
            note: note.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn attach_molecule_modified(&self, molecule_id: i64, audit_id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .view_mut()
            .molecule_modified
            .entry(molecule_id)
            .or_default()
            .push(audit_id);
        Ok(())
    }

    async fn attach_referrer_modified(&self, referrer_id: i64, audit_id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .view_mut()
            .referrer_modified
            .entry(referrer_id)
            .or_default()
            .push(audit_id);
        Ok(())
    }

    async fn begin_transaction(&self) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.working.is_some() {
            return Err(StoreError::TransactionState(
                "a transaction is already open".to_string(),
            ));
        }
        state.working = Some(state.committed.clone());
        Ok(())
    }

    async fn commit(&self) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let working = state.working.take().ok_or_else(|| {
            StoreError::TransactionState("commit without an open transaction".to_string())
        })?;
        state.committed = working;
        Ok(())
    }

    async fn rollback(&self) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.working.take().is_none() {
            return Err(StoreError::TransactionState(
                "rollback without an open transaction".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn molecule(id: i64, identifier: Option<&str>, names: &[&str]) -> Molecule {
        Molecule {
            id,
            identifier: identifier.map(str::to_string),
            names: names.iter().map(|s| (*s).to_string()).collect(),
            formula: None,
            display_name: None,
            reference_database_id: 1,
        }
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        store.add_molecule(molecule(1, Some("15377"), &["water"])).await;

        store.begin_transaction().await.unwrap();
        store
            .update_molecule_names(1, &["oxidane".to_string()])
            .await
            .unwrap();
        store.rollback().await.unwrap();

        let m = store.molecule(1).await.unwrap().unwrap();
        assert_eq!(m.names, vec!["water".to_string()]);
    }

    #[tokio::test]
    async fn test_commit_promotes_writes() {
        let store = MemoryStore::new();
        store.add_molecule(molecule(1, Some("15377"), &["water"])).await;

        store.begin_transaction().await.unwrap();
        store
            .update_molecule_formula(1, Some("H2O"))
            .await
            .unwrap();
        store.commit().await.unwrap();

        let m = store.molecule(1).await.unwrap().unwrap();
        assert_eq!(m.formula.as_deref(), Some("H2O"));
    }

    #[tokio::test]
    async fn test_nested_transaction_rejected() {
        let store = MemoryStore::new();
        store.begin_transaction().await.unwrap();
        let err = store.begin_transaction().await.unwrap_err();
        assert!(matches!(err, StoreError::TransactionState(_)));
    }

    #[tokio::test]
    async fn test_creator_resolution() {
        let store = MemoryStore::new();
        store
            .add_person(Person {
                id: 7,
                surname: Some("Curie".to_string()),
                first_name: Some("Marie".to_string()),
            })
            .await;
        store
            .add_referrer(Referrer {
                id: 20,
                molecule_id: 1,
                names: vec!["x".to_string()],
                display_name: None,
            })
            .await;
        store.set_referrer_creator(20, 7).await;

        let creator = store.creator_of_referrer(20).await.unwrap().unwrap();
        assert_eq!(creator.surname.as_deref(), Some("Curie"));
        assert!(store.creator_of_referrer(21).await.unwrap().is_none());
    }
}
