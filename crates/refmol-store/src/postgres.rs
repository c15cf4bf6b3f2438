//! Postgres implementation of [`MoleculeStore`].
//!
//! Reads outside a transaction run against the pool; once
//! `begin_transaction` opens the run transaction, every read and write
//! is routed through it until `commit` or `rollback`.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::models::{Molecule, Person, Referrer};
use crate::store::MoleculeStore;

/// Postgres-backed store over the curated schema.
pub struct PgMoleculeStore {
    pool: PgPool,
    txn: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PgMoleculeStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            txn: Mutex::new(None),
        }
    }

    /// Access the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Row shape for `molecule` queries.
#[derive(Debug, sqlx::FromRow)]
struct MoleculeRow {
    id: i64,
    identifier: Option<String>,
    formula: Option<String>,
    display_name: Option<String>,
    reference_database_id: i64,
}

/// Row shape for `person` queries.
#[derive(Debug, sqlx::FromRow)]
struct PersonRow {
    id: i64,
    surname: Option<String>,
    first_name: Option<String>,
}

impl From<PersonRow> for Person {
    fn from(row: PersonRow) -> Self {
        Person {
            id: row.id,
            surname: row.surname,
            first_name: row.first_name,
        }
    }
}

/// Runs the given closure body against either the open transaction or
/// a pooled connection.
macro_rules! with_conn {
    ($store:expr, $conn:ident, $body:expr) => {{
        let mut guard = $store.txn.lock().await;
        match guard.as_mut() {
            Some(tx) => {
                let $conn: &mut PgConnection = &mut **tx;
                $body
            }
            None => {
                let mut pooled = $store
                    .pool
                    .acquire()
                    .await
                    .map_err(StoreError::ConnectionFailed)?;
                let $conn: &mut PgConnection = &mut pooled;
                $body
            }
        }
    }};
}

#[async_trait]
impl MoleculeStore for PgMoleculeStore {
    async fn reference_database_id(&self, name: &str) -> StoreResult<Option<i64>> {
        with_conn!(self, conn, {
            sqlx::query_scalar("SELECT id FROM reference_database WHERE name = $1")
                .bind(name)
                .fetch_optional(conn)
                .await
                .map_err(StoreError::QueryFailed)
        })
    }

    async fn molecules_for_database(
        &self,
        reference_database_id: i64,
    ) -> StoreResult<Vec<Molecule>> {
        with_conn!(self, conn, {
            let rows: Vec<MoleculeRow> = sqlx::query_as(
                r"
                SELECT id, identifier, formula, display_name, reference_database_id
                FROM molecule
                WHERE reference_database_id = $1
                ORDER BY id
                ",
            )
            .bind(reference_database_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(StoreError::QueryFailed)?;

            assemble_molecules(conn, rows).await
        })
    }

    async fn molecule(&self, id: i64) -> StoreResult<Option<Molecule>> {
        with_conn!(self, conn, {
            let row: Option<MoleculeRow> = sqlx::query_as(
                r"
                SELECT id, identifier, formula, display_name, reference_database_id
                FROM molecule
                WHERE id = $1
                ",
            )
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(StoreError::QueryFailed)?;

            match row {
                Some(row) => Ok(assemble_molecules(conn, vec![row]).await?.pop()),
                None => Ok(None),
            }
        })
    }

    async fn molecules_with_identifier(
        &self,
        reference_database_id: i64,
        identifier: &str,
    ) -> StoreResult<Vec<Molecule>> {
        with_conn!(self, conn, {
            let rows: Vec<MoleculeRow> = sqlx::query_as(
                r"
                SELECT id, identifier, formula, display_name, reference_database_id
                FROM molecule
                WHERE reference_database_id = $1 AND identifier = $2
                ORDER BY id
                ",
            )
            .bind(reference_database_id)
            .bind(identifier)
            .fetch_all(&mut *conn)
            .await
            .map_err(StoreError::QueryFailed)?;

            assemble_molecules(conn, rows).await
        })
    }

    async fn referrers_of(&self, molecule_id: i64) -> StoreResult<Vec<Referrer>> {
        with_conn!(self, conn, {
            let rows: Vec<(i64, i64, Option<String>)> = sqlx::query_as(
                r"
                SELECT id, molecule_id, display_name
                FROM referrer
                WHERE molecule_id = $1
                ORDER BY id
                ",
            )
            .bind(molecule_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(StoreError::QueryFailed)?;

            let ids: Vec<i64> = rows.iter().map(|r| r.0).collect();
            let names: Vec<(i64, String)> = sqlx::query_as(
                r"
                SELECT referrer_id, name
                FROM referrer_name
                WHERE referrer_id = ANY($1)
                ORDER BY referrer_id, position
                ",
            )
            .bind(&ids)
            .fetch_all(&mut *conn)
            .await
            .map_err(StoreError::QueryFailed)?;

            let mut referrers: Vec<Referrer> = rows
                .into_iter()
                .map(|(id, molecule_id, display_name)| Referrer {
                    id,
                    molecule_id,
                    names: Vec::new(),
                    display_name,
                })
                .collect();
            for (referrer_id, name) in names {
                if let Some(r) = referrers.iter_mut().find(|r| r.id == referrer_id) {
                    r.names.push(name);
                }
            }
            Ok(referrers)
        })
    }

    async fn creator_of_referrer(&self, referrer_id: i64) -> StoreResult<Option<Person>> {
        with_conn!(self, conn, {
            let row: Option<PersonRow> = sqlx::query_as(
                r"
                SELECT p.id, p.surname, p.first_name
                FROM referrer r
                JOIN instance_edit ie ON ie.id = r.created_edit_id
                JOIN person p ON p.id = ie.person_id
                WHERE r.id = $1
                ",
            )
            .bind(referrer_id)
            .fetch_optional(conn)
            .await
            .map_err(StoreError::QueryFailed)?;
            Ok(row.map(Person::from))
        })
    }

    async fn update_molecule_names(&self, id: i64, names: &[String]) -> StoreResult<()> {
        with_conn!(self, conn, {
            replace_names(conn, "molecule_name", "molecule_id", id, names).await
        })
    }

    async fn update_molecule_formula(&self, id: i64, formula: Option<&str>) -> StoreResult<()> {
        with_conn!(self, conn, {
            let result = sqlx::query("UPDATE molecule SET formula = $2 WHERE id = $1")
                .bind(id)
                .bind(formula)
                .execute(conn)
                .await
                .map_err(StoreError::QueryFailed)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("molecule {id}")));
            }
            Ok(())
        })
    }

    async fn update_molecule_display_name(&self, id: i64, display_name: &str) -> StoreResult<()> {
        with_conn!(self, conn, {
            let result = sqlx::query("UPDATE molecule SET display_name = $2 WHERE id = $1")
                .bind(id)
                .bind(display_name)
                .execute(conn)
                .await
                .map_err(StoreError::QueryFailed)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("molecule {id}")));
            }
            Ok(())
        })
    }

    async fn update_referrer_names(&self, id: i64, names: &[String]) -> StoreResult<()> {
        with_conn!(self, conn, {
            replace_names(conn, "referrer_name", "referrer_id", id, names).await
        })
    }

    async fn create_audit_record(&self, person_id: i64, note: &str) -> StoreResult<i64> {
        with_conn!(self, conn, {
            sqlx::query_scalar(
                "INSERT INTO instance_edit (person_id, note) VALUES ($1, $2) RETURNING id",
            )
            .bind(person_id)
            .bind(note)
            .fetch_one(conn)
            .await
            .map_err(StoreError::QueryFailed)
        })
    }

    async fn attach_molecule_modified(&self, molecule_id: i64, audit_id: i64) -> StoreResult<()> {
        with_conn!(self, conn, {
            sqlx::query(
                r"
                INSERT INTO molecule_modified (molecule_id, instance_edit_id, position)
                VALUES ($1, $2, (
                    SELECT COALESCE(MAX(position) + 1, 0)
                    FROM molecule_modified WHERE molecule_id = $1
                ))
                ",
            )
            .bind(molecule_id)
            .bind(audit_id)
            .execute(conn)
            .await
            .map_err(StoreError::QueryFailed)?;
            Ok(())
        })
    }

    async fn attach_referrer_modified(&self, referrer_id: i64, audit_id: i64) -> StoreResult<()> {
        with_conn!(self, conn, {
            sqlx::query(
                r"
                INSERT INTO referrer_modified (referrer_id, instance_edit_id, position)
                VALUES ($1, $2, (
                    SELECT COALESCE(MAX(position) + 1, 0)
                    FROM referrer_modified WHERE referrer_id = $1
                ))
                ",
            )
            .bind(referrer_id)
            .bind(audit_id)
            .execute(conn)
            .await
            .map_err(StoreError::QueryFailed)?;
            Ok(())
        })
    }

    async fn begin_transaction(&self) -> StoreResult<()> {
        let mut guard = self.txn.lock().await;
        if guard.is_some() {
            return Err(StoreError::TransactionState(
                "a transaction is already open".to_string(),
            ));
        }
        let tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::ConnectionFailed)?;
        *guard = Some(tx);
        Ok(())
    }

    async fn commit(&self) -> StoreResult<()> {
        let mut guard = self.txn.lock().await;
        let tx = guard.take().ok_or_else(|| {
            StoreError::TransactionState("commit without an open transaction".to_string())
        })?;
        tx.commit().await.map_err(StoreError::QueryFailed)
    }

    async fn rollback(&self) -> StoreResult<()> {
        let mut guard = self.txn.lock().await;
        let tx = guard.take().ok_or_else(|| {
            StoreError::TransactionState("rollback without an open transaction".to_string())
        })?;
        tx.rollback().await.map_err(StoreError::QueryFailed)
    }
}

/// Attach ordered name lists to a batch of molecule rows.
async fn assemble_molecules(
    conn: &mut PgConnection,
    rows: Vec<MoleculeRow>,
) -> StoreResult<Vec<Molecule>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let names: Vec<(i64, String)> = sqlx::query_as(
        r"
        SELECT molecule_id, name
        FROM molecule_name
        WHERE molecule_id = ANY($1)
        ORDER BY molecule_id, position
        ",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await
    .map_err(StoreError::QueryFailed)?;

    let mut molecules: Vec<Molecule> = rows
        .into_iter()
        .map(|row| Molecule {
            id: row.id,
            identifier: row.identifier,
            names: Vec::new(),
            formula: row.formula,
            display_name: row.display_name,
            reference_database_id: row.reference_database_id,
        })
        .collect();
    for (molecule_id, name) in names {
        if let Some(m) = molecules.iter_mut().find(|m| m.id == molecule_id) {
            m.names.push(name);
        }
    }
    Ok(molecules)
}

/// Replace the ordered name list of a molecule or referrer.
///
/// Table and column names are compile-time constants from the call
/// sites, never user input.
async fn replace_names(
    conn: &mut PgConnection,
    table: &str,
    owner_column: &str,
    owner_id: i64,
    names: &[String],
) -> StoreResult<()> {
    sqlx::query(&format!("DELETE FROM {table} WHERE {owner_column} = $1"))
        .bind(owner_id)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::QueryFailed)?;

    for (position, name) in names.iter().enumerate() {
        sqlx::query(&format!(
            "INSERT INTO {table} ({owner_column}, position, name) VALUES ($1, $2, $3)"
        ))
        .bind(owner_id)
        .bind(position as i32)
        .bind(name)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::QueryFailed)?;
    }
    Ok(())
}
