//! In-process memory store.
//!
//! An append-only log of records behind a tokio `RwLock`. Queries take a
//! read lock; appends and in-place upserts take the write lock briefly.
//! The log can be loaded from and saved to a JSON file.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::similarity::word_overlap;
use super::{MemoryError, MemoryQuery, MemoryRecord, ScoredRecord, SimilarityMemory};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<MemoryRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<MemoryRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Load records from a JSON file. A missing file yields an empty store.
    pub async fn load(path: &Path) -> Result<Self, MemoryError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MemoryError::ReadFile {
                path: path.display().to_string(),
                source: e,
            })?;
        let records: Vec<MemoryRecord> =
            serde_json::from_str(&content).map_err(|e| MemoryError::Parse {
                path: path.display().to_string(),
                source: e,
            })?;
        tracing::debug!(path = %path.display(), records = records.len(), "loaded memory");
        Ok(Self::with_records(records))
    }

    /// Write all records to a JSON file, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<(), MemoryError> {
        let write_err = |e| MemoryError::WriteFile {
            path: path.display().to_string(),
            source: e,
        };
        let content = {
            let records = self.records.read().await;
            serde_json::to_string_pretty(&*records).map_err(|e| MemoryError::Parse {
                path: path.display().to_string(),
                source: e,
            })?
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
            }
        }
        tokio::fs::write(path, content).await.map_err(write_err)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SimilarityMemory for InMemoryStore {
    async fn upsert(&self, record: MemoryRecord) -> Result<(), MemoryError> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    async fn query(&self, query: &MemoryQuery) -> Result<Vec<ScoredRecord>, MemoryError> {
        if query.k == 0 {
            return Ok(Vec::new());
        }
        let records = self.records.read().await;
        let mut scored: Vec<ScoredRecord> = records
            .iter()
            .filter(|r| query.repo.as_deref().is_none_or(|repo| r.repo == repo))
            .filter(|r| query.author_key.as_deref().is_none_or(|key| r.author_key == key))
            .map(|r| ScoredRecord {
                score: word_overlap(&query.text, &format!("{} {}", r.kind, r.description)),
                record: r.clone(),
            })
            .filter(|s| s.score > 0.0)
            .collect();
        drop(records);

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(query.k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::author_key;
    use crate::models::Severity;
    use chrono::Utc;
    use std::sync::Arc;

    fn record(id: &str, repo: &str, author: &str, description: &str) -> MemoryRecord {
        MemoryRecord {
            id: id.into(),
            repo: repo.into(),
            author_key: author_key(author),
            kind: "Hardcoded Secret".into(),
            description: description.into(),
            severity: Severity::High,
            false_positive: false,
            recorded_at: Utc::now(),
        }
    }

    fn query(text: &str, k: usize) -> MemoryQuery {
        MemoryQuery {
            text: text.into(),
            k,
            repo: Some("org/repo".into()),
            author_key: Some(author_key("alice")),
        }
    }

    #[tokio::test]
    async fn query_orders_by_similarity_and_truncates() {
        let store = InMemoryStore::new();
        store.upsert(record("1", "org/repo", "alice", "password literal in login")).await.unwrap();
        store.upsert(record("2", "org/repo", "alice", "hardcoded secret password literal")).await.unwrap();
        store.upsert(record("3", "org/repo", "alice", "unrelated words")).await.unwrap();

        let results = store.query(&query("Hardcoded Secret password literal", 2)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.id, "2");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn query_respects_scope() {
        let store = InMemoryStore::new();
        store.upsert(record("1", "org/repo", "alice", "password literal")).await.unwrap();
        store.upsert(record("2", "org/other", "alice", "password literal")).await.unwrap();
        store.upsert(record("3", "org/repo", "bob", "password literal")).await.unwrap();

        let results = store.query(&query("password literal", 10)).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|s| s.record.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = InMemoryStore::new();
        store.upsert(record("1", "org/repo", "alice", "first")).await.unwrap();
        let mut updated = record("1", "org/repo", "alice", "first");
        updated.false_positive = true;
        store.upsert(updated).await.unwrap();

        assert_eq!(store.len().await, 1);
        let results = store.query(&query("Hardcoded Secret first", 1)).await.unwrap();
        assert!(results[0].record.false_positive);
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_kept() {
        let store = Arc::new(InMemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .upsert(record(&i.to_string(), "org/repo", "alice", "password literal"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.len().await, 32);
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.json");

        let store = InMemoryStore::new();
        store.upsert(record("1", "org/repo", "alice", "password literal")).await.unwrap();
        store.save(&path).await.unwrap();

        let loaded = InMemoryStore::load(&path).await.unwrap();
        assert_eq!(loaded.len().await, 1);
    }

    #[tokio::test]
    async fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = InMemoryStore::load(&dir.path().join("none.json")).await.unwrap();
        assert!(loaded.is_empty().await);
    }

    #[tokio::test]
    async fn load_invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "not json").unwrap();
        let err = InMemoryStore::load(&path).await.unwrap_err();
        assert!(matches!(err, MemoryError::Parse { .. }));
    }
}
