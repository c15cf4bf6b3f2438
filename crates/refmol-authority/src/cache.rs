//! Append-only TSV cache of authority responses.
//!
//! One line per successful lookup:
//! `queriedId<TAB>canonicalId<TAB>asciiName<TAB>formula<TAB>isoTimestamp`.
//! The file is read once when the cache is opened; new responses are
//! appended and flushed immediately so a partial run leaves a usable
//! cache behind. Entries appended during a pass are never read back
//! within the same pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{AuthorityError, AuthorityResult};
use crate::record::AuthorityRecord;

/// One cached authority response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The identifier as it was queried, namespace-qualified.
    pub queried_id: String,
    /// The canonical identifier the authority answered with.
    pub canonical_id: String,
    /// ASCII name.
    pub ascii_name: String,
    /// First formula, if the authority reported one.
    pub formula: Option<String>,
}

impl CacheEntry {
    /// Reconstruct a minimal authority record from this entry.
    ///
    /// Only id, name and the first formula survive the cache; that is
    /// all the reconciliation engine consumes.
    #[must_use]
    pub fn to_record(&self) -> AuthorityRecord {
        AuthorityRecord {
            id: self.canonical_id.clone(),
            ascii_name: self.ascii_name.clone(),
            formulae: self.formula.iter().cloned().collect(),
        }
    }
}

/// File-backed response cache.
pub struct FileCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
    writer: Mutex<tokio::fs::File>,
}

impl FileCache {
    /// Open the cache at `path`, loading any existing entries.
    ///
    /// A missing file means an empty cache.
    pub async fn open(path: impl AsRef<Path>) -> AuthorityResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries = HashMap::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                for (lineno, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_line(line) {
                        Some(entry) => {
                            entries.insert(entry.queried_id.clone(), entry);
                        }
                        None => {
                            warn!(
                                path = %path.display(),
                                line = lineno + 1,
                                "skipping malformed cache line"
                            );
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AuthorityError::Cache(e)),
        }

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(AuthorityError::Cache)?;

        debug!(path = %path.display(), entries = entries.len(), "cache opened");
        Ok(Self {
            path,
            entries,
            writer: Mutex::new(writer),
        })
    }

    /// Look up a namespace-qualified identifier.
    #[must_use]
    pub fn get(&self, queried_id: &str) -> Option<&CacheEntry> {
        self.entries.get(queried_id)
    }

    /// Number of entries loaded at open time.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries were loaded at open time.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cache file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and flush it to disk.
    ///
    /// Safe to call from concurrent fetch tasks; physical writes are
    /// serialised behind the mutex.
    pub async fn append(&self, entry: &CacheEntry) -> AuthorityResult<()> {
        let line = format!(
            "{}\t{}\t{}\t{}\t{}\n",
            entry.queried_id,
            entry.canonical_id,
            entry.ascii_name,
            entry.formula.as_deref().unwrap_or(""),
            Utc::now().to_rfc3339(),
        );
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(AuthorityError::Cache)?;
        writer.flush().await.map_err(AuthorityError::Cache)?;
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<CacheEntry> {
    let mut parts = line.split('\t');
    let queried_id = parts.next()?.to_string();
    let canonical_id = parts.next()?.to_string();
    let ascii_name = parts.next()?.to_string();
    let formula = match parts.next() {
        Some("") | None => None,
        Some(f) => Some(f.to_string()),
    };
    // Trailing timestamp is informational only.
    Some(CacheEntry {
        queried_id,
        canonical_id,
        ascii_name,
        formula,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path().join("chebi-cache.tsv"))
            .await
            .unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_append_then_reopen_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chebi-cache.tsv");

        let cache = FileCache::open(&path).await.unwrap();
        cache
            .append(&CacheEntry {
                queried_id: "CHEBI:15377".to_string(),
                canonical_id: "CHEBI:15377".to_string(),
                ascii_name: "water".to_string(),
                formula: Some("H2O".to_string()),
            })
            .await
            .unwrap();
        cache
            .append(&CacheEntry {
                queried_id: "CHEBI:16236".to_string(),
                canonical_id: "CHEBI:16236".to_string(),
                ascii_name: "ethanol".to_string(),
                formula: None,
            })
            .await
            .unwrap();

        let reopened = FileCache::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 2);

        let water = reopened.get("CHEBI:15377").unwrap();
        assert_eq!(water.ascii_name, "water");
        assert_eq!(water.formula.as_deref(), Some("H2O"));
        let record = water.to_record();
        assert_eq!(record.canonical_id(), "15377");
        assert_eq!(record.primary_formula(), Some("H2O"));

        // Empty formula column comes back as None.
        let ethanol = reopened.get("CHEBI:16236").unwrap();
        assert!(ethanol.formula.is_none());
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chebi-cache.tsv");
        tokio::fs::write(&path, "garbage-without-tabs\nCHEBI:1\tCHEBI:1\tthing\t\tts\n")
            .await
            .unwrap();

        let cache = FileCache::open(&path).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("CHEBI:1").is_some());
    }
}
