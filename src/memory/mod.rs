//! Similarity memory of past findings.
//!
//! The enrichment stage asks this store how often a finding has been seen
//! before for the same repository and author, and whether developers
//! flagged it as a false positive.

pub mod similarity;
pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{Finding, Severity};

pub use store::InMemoryStore;

/// Errors from a memory backend.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("memory backend unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read memory file {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write memory file {path}: {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid memory file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// One remembered finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub repo: String,
    /// Hex `sha256` of the author, see [`author_key`].
    pub author_key: String,
    pub kind: String,
    pub description: String,
    pub severity: Severity,
    /// Set when developer feedback marked this finding as a false positive.
    #[serde(default)]
    pub false_positive: bool,
    pub recorded_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Record a finding from a completed run.
    pub fn from_finding(run_id: &str, repo: &str, author: &str, finding: &Finding) -> Self {
        Self {
            id: format!("{run_id}:{}", finding.id),
            repo: repo.to_string(),
            author_key: author_key(author),
            kind: finding.kind.clone(),
            description: finding.description.clone(),
            severity: finding.severity,
            false_positive: false,
            recorded_at: Utc::now(),
        }
    }
}

/// A similarity lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryQuery {
    pub text: String,
    pub k: usize,
    /// Restrict to one repository.
    pub repo: Option<String>,
    /// Restrict to one author (hashed).
    pub author_key: Option<String>,
}

/// A record with its similarity to the query, in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub score: f64,
}

/// Store of past findings supporting concurrent reads and appends.
#[async_trait]
pub trait SimilarityMemory: Send + Sync {
    /// Insert a record, replacing any record with the same id.
    async fn upsert(&self, record: MemoryRecord) -> Result<(), MemoryError>;

    /// Up to `query.k` records, most similar first.
    async fn query(&self, query: &MemoryQuery) -> Result<Vec<ScoredRecord>, MemoryError>;
}

/// Stable, non-reversible key for an author identity.
pub fn author_key(author: &str) -> String {
    hex::encode(Sha256::digest(author.trim().to_lowercase().as_bytes()))
}

/// `repo:sha256(author)` scope of a run.
pub fn memory_key(repo: &str, author: &str) -> String {
    format!("{repo}:{}", author_key(author))
}
