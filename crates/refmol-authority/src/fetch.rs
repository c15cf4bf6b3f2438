//! Bounded-concurrency bulk retrieval of authority records.
//!
//! Every input record ends up in exactly one of the two result maps:
//! `records` (an authoritative record was obtained) or `failures` (a
//! human-readable reason). Per-record faults never interrupt the
//! batch; a systemic fault aborts the remaining tasks and fails the
//! whole pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace};

use crate::cache::{CacheEntry, FileCache};
use crate::client::AuthorityClient;
use crate::error::{AuthorityError, AuthorityResult};
use crate::record::{self, AuthorityRecord};

/// How often to log fetch progress.
const PROGRESS_INTERVAL: usize = 250;

/// One local record to resolve against the authority.
#[derive(Debug, Clone)]
pub struct FetchTarget {
    /// Local store id of the record.
    pub id: i64,
    /// Authority identifier, possibly missing.
    pub identifier: Option<String>,
    /// Human-readable label for failure reports.
    pub label: String,
}

/// Result of a bulk retrieval pass.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Local record id -> authority record.
    pub records: HashMap<i64, AuthorityRecord>,
    /// Local record id -> failure reason.
    pub failures: HashMap<i64, String>,
}

enum TaskResult {
    Record(AuthorityRecord),
    Failure(String),
    Fatal(AuthorityError),
}

/// Concurrent, cache-aware fetcher.
pub struct Fetcher {
    client: Arc<dyn AuthorityClient>,
    cache: Option<Arc<FileCache>>,
    max_in_flight: usize,
}

impl Fetcher {
    /// Create a fetcher. `cache` of `None` disables caching entirely;
    /// `max_in_flight` bounds concurrent authority calls.
    #[must_use]
    pub fn new(
        client: Arc<dyn AuthorityClient>,
        cache: Option<Arc<FileCache>>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            client,
            cache,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Resolve all targets against the authority.
    ///
    /// Returns `Err` only for systemic faults; the coordinator must
    /// not proceed to reconciliation in that case.
    pub async fn fetch_all(&self, targets: Vec<FetchTarget>) -> AuthorityResult<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let counter = Arc::new(AtomicUsize::new(0));
        let mut tasks: JoinSet<(i64, TaskResult)> = JoinSet::new();

        for target in targets {
            // Blank identifiers are a data fault, not worth a task.
            let identifier = match target.identifier.as_deref() {
                Some(id) if !id.trim().is_empty() => id.to_string(),
                _ => {
                    error!(
                        record = target.id,
                        label = %target.label,
                        "record has an empty/NULL identifier"
                    );
                    outcome.failures.insert(
                        target.id,
                        format!("{} has an empty/NULL identifier.", target.label),
                    );
                    continue;
                }
            };

            let client = Arc::clone(&self.client);
            let cache = self.cache.clone();
            let semaphore = Arc::clone(&semaphore);
            let counter = Arc::clone(&counter);
            let record_id = target.id;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            record_id,
                            TaskResult::Fatal(AuthorityError::Service {
                                message: "fetch pool closed unexpectedly".to_string(),
                            }),
                        )
                    }
                };
                let result = fetch_one(client.as_ref(), cache.as_deref(), &identifier).await;
                let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_INTERVAL == 0 {
                    debug!("{done} authority identifiers checked");
                }
                (record_id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((record_id, TaskResult::Record(record))) => {
                    outcome.records.insert(record_id, record);
                }
                Ok((record_id, TaskResult::Failure(reason))) => {
                    outcome.failures.insert(record_id, reason);
                }
                Ok((record_id, TaskResult::Fatal(err))) => {
                    error!(record = record_id, error = %err, "systemic authority fault, aborting fetch");
                    tasks.abort_all();
                    return Err(err);
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    tasks.abort_all();
                    return Err(AuthorityError::Service {
                        message: format!("fetch task failed: {join_err}"),
                    });
                }
            }
        }

        info!(
            retrieved = outcome.records.len(),
            failed = outcome.failures.len(),
            "authority retrieval pass complete"
        );
        Ok(outcome)
    }
}

/// Resolve a single identifier: cache probe, then the live service.
async fn fetch_one(
    client: &dyn AuthorityClient,
    cache: Option<&FileCache>,
    identifier: &str,
) -> TaskResult {
    let qualified = record::qualify(identifier);

    if let Some(cache) = cache {
        if let Some(entry) = cache.get(&qualified) {
            return TaskResult::Record(entry.to_record());
        }
        if !cache.is_empty() {
            trace!(identifier = %qualified, "cache miss");
        }
    }

    match client.get_record(identifier).await {
        Ok(Some(record)) => {
            if let Some(cache) = cache {
                let entry = CacheEntry {
                    queried_id: qualified,
                    canonical_id: record.id.clone(),
                    ascii_name: record.ascii_name.clone(),
                    formula: record.primary_formula().map(str::to_string),
                };
                if let Err(e) = cache.append(&entry).await {
                    // Losing durability mid-run is an infrastructure
                    // problem; stop before it compounds.
                    return TaskResult::Fatal(e);
                }
            }
            TaskResult::Record(record)
        }
        Ok(None) => TaskResult::Failure("WebService response was NULL.".to_string()),
        Err(e) if e.is_per_record() => {
            error!(identifier, error = %e, "authority lookup failed for record");
            TaskResult::Failure(e.to_string())
        }
        Err(e) => TaskResult::Fatal(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted client: maps identifier -> canned outcome, counting calls.
    struct ScriptedClient {
        responses: HashMap<String, ScriptedResponse>,
        calls: Mutex<Vec<String>>,
    }

    #[derive(Clone)]
    enum ScriptedResponse {
        Record(AuthorityRecord),
        Missing,
        Invalid,
        Obsolete,
        ServerError,
    }

    impl ScriptedClient {
        fn new(responses: HashMap<String, ScriptedResponse>) -> Self {
            Self {
                responses,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AuthorityClient for ScriptedClient {
        async fn get_record(
            &self,
            identifier: &str,
        ) -> AuthorityResult<Option<AuthorityRecord>> {
            self.calls.lock().unwrap().push(identifier.to_string());
            match self.responses.get(identifier) {
                Some(ScriptedResponse::Record(r)) => Ok(Some(r.clone())),
                Some(ScriptedResponse::Missing) | None => Ok(None),
                Some(ScriptedResponse::Invalid) => Err(AuthorityError::InvalidIdentifier {
                    identifier: identifier.to_string(),
                }),
                Some(ScriptedResponse::Obsolete) => Err(AuthorityError::ObsoleteEntity {
                    identifier: identifier.to_string(),
                }),
                Some(ScriptedResponse::ServerError) => Err(AuthorityError::Service {
                    message: "boom".to_string(),
                }),
            }
        }
    }

    fn water_record() -> AuthorityRecord {
        AuthorityRecord {
            id: "CHEBI:15377".to_string(),
            ascii_name: "water".to_string(),
            formulae: vec!["H2O".to_string()],
        }
    }

    fn target(id: i64, identifier: Option<&str>) -> FetchTarget {
        FetchTarget {
            id,
            identifier: identifier.map(str::to_string),
            label: format!("molecule-{id}"),
        }
    }

    #[tokio::test]
    async fn test_every_target_lands_in_exactly_one_map() {
        let mut responses = HashMap::new();
        responses.insert("15377".to_string(), ScriptedResponse::Record(water_record()));
        responses.insert("bad".to_string(), ScriptedResponse::Invalid);
        responses.insert("99999".to_string(), ScriptedResponse::Obsolete);
        responses.insert("77777".to_string(), ScriptedResponse::Missing);
        let client = Arc::new(ScriptedClient::new(responses));

        let fetcher = Fetcher::new(client, None, 4);
        let outcome = fetcher
            .fetch_all(vec![
                target(1, Some("15377")),
                target(2, Some("bad")),
                target(3, Some("99999")),
                target(4, Some("77777")),
                target(5, None),
                target(6, Some("  ")),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.failures.len(), 5);
        assert!(outcome.records.contains_key(&1));
        assert!(outcome.failures[&4].contains("NULL"));
        assert!(outcome.failures[&5].contains("empty/NULL identifier"));
        assert!(outcome.failures[&6].contains("empty/NULL identifier"));
    }

    #[tokio::test]
    async fn test_systemic_fault_aborts_pass() {
        let mut responses = HashMap::new();
        responses.insert("15377".to_string(), ScriptedResponse::Record(water_record()));
        responses.insert("500".to_string(), ScriptedResponse::ServerError);
        let client = Arc::new(ScriptedClient::new(responses));

        let fetcher = Fetcher::new(client, None, 1);
        let err = fetcher
            .fetch_all(vec![target(1, Some("500")), target(2, Some("15377"))])
            .await
            .unwrap_err();
        assert!(err.is_systemic());
    }

    #[tokio::test]
    async fn test_cache_hit_issues_no_network_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chebi-cache.tsv");
        let warm = FileCache::open(&path).await.unwrap();
        warm.append(&CacheEntry {
            queried_id: "CHEBI:15377".to_string(),
            canonical_id: "CHEBI:15377".to_string(),
            ascii_name: "water".to_string(),
            formula: Some("H2O".to_string()),
        })
        .await
        .unwrap();
        drop(warm);

        let cache = Arc::new(FileCache::open(&path).await.unwrap());
        let client = Arc::new(ScriptedClient::new(HashMap::new()));
        let fetcher = Fetcher::new(Arc::clone(&client) as Arc<dyn AuthorityClient>, Some(cache), 4);

        let outcome = fetcher.fetch_all(vec![target(1, Some("15377"))]).await.unwrap();
        assert_eq!(outcome.records[&1].ascii_name, "water");
        assert_eq!(outcome.records[&1].primary_formula(), Some("H2O"));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_miss_populates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chebi-cache.tsv");
        let cache = Arc::new(FileCache::open(&path).await.unwrap());

        let mut responses = HashMap::new();
        responses.insert("15377".to_string(), ScriptedResponse::Record(water_record()));
        let client = Arc::new(ScriptedClient::new(responses));
        let fetcher = Fetcher::new(client, Some(cache), 4);

        let outcome = fetcher.fetch_all(vec![target(1, Some("15377"))]).await.unwrap();
        assert_eq!(outcome.records.len(), 1);

        let reopened = FileCache::open(&path).await.unwrap();
        let entry = reopened.get("CHEBI:15377").unwrap();
        assert_eq!(entry.ascii_name, "water");
        assert_eq!(entry.formula.as_deref(), Some("H2O"));
    }
}
