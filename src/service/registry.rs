//! Run status registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::RwLock;

use super::ServiceError;
use crate::models::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

/// Status of one submitted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Present once completed.
    pub report: Option<RunReport>,
    /// Input problem, present with status `error`.
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn queued(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            report: None,
            error: None,
        }
    }
}

/// Process-wide run registry. Read by callers, written by workers.
#[async_trait]
pub trait TaskRegistry: Send + Sync {
    async fn create(&self, id: &str) -> Result<TaskRecord, ServiceError>;

    async fn mark_processing(&self, id: &str) -> Result<(), ServiceError>;

    async fn complete(&self, id: &str, report: RunReport) -> Result<(), ServiceError>;

    async fn fail(&self, id: &str, error: String) -> Result<(), ServiceError>;

    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, ServiceError>;

    /// All runs in submission order.
    async fn list(&self) -> Result<Vec<TaskRecord>, ServiceError>;
}

/// Registry kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    tasks: RwLock<IndexMap<String, TaskRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update(&self, id: &str, f: impl FnOnce(&mut TaskRecord)) -> Result<(), ServiceError> {
        let mut tasks = self.tasks.write().await;
        let record = tasks
            .get_mut(id)
            .ok_or_else(|| ServiceError::UnknownRun(id.to_string()))?;
        f(record);
        Ok(())
    }
}

#[async_trait]
impl TaskRegistry for InMemoryRegistry {
    async fn create(&self, id: &str) -> Result<TaskRecord, ServiceError> {
        let record = TaskRecord::queued(id);
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(id) {
            return Err(ServiceError::DuplicateRun(id.to_string()));
        }
        tasks.insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn mark_processing(&self, id: &str) -> Result<(), ServiceError> {
        self.update(id, |r| {
            r.status = TaskStatus::Processing;
            r.started_at = Some(Utc::now());
        })
        .await
    }

    async fn complete(&self, id: &str, report: RunReport) -> Result<(), ServiceError> {
        self.update(id, |r| {
            r.status = TaskStatus::Completed;
            r.completed_at = Some(Utc::now());
            r.report = Some(report);
        })
        .await
    }

    async fn fail(&self, id: &str, error: String) -> Result<(), ServiceError> {
        self.update(id, |r| {
            r.status = TaskStatus::Error;
            r.completed_at = Some(Utc::now());
            r.error = Some(error);
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, ServiceError> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<TaskRecord>, ServiceError> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_flow_sets_timestamps() {
        let registry = InMemoryRegistry::new();
        let created = registry.create("r1").await.unwrap();
        assert_eq!(created.status, TaskStatus::Queued);
        assert!(created.started_at.is_none());

        registry.mark_processing("r1").await.unwrap();
        let processing = registry.get("r1").await.unwrap().unwrap();
        assert_eq!(processing.status, TaskStatus::Processing);
        assert!(processing.started_at.is_some());

        registry.fail("r1", "bad input".into()).await.unwrap();
        let failed = registry.get("r1").await.unwrap().unwrap();
        assert_eq!(failed.status, TaskStatus::Error);
        assert_eq!(failed.error.as_deref(), Some("bad input"));
        assert!(failed.completed_at.unwrap() >= failed.created_at);
        assert!(failed.status.is_finished());
    }

    #[tokio::test]
    async fn unknown_and_duplicate_runs() {
        let registry = InMemoryRegistry::new();
        assert!(matches!(
            registry.mark_processing("nope").await,
            Err(ServiceError::UnknownRun(_))
        ));
        registry.create("r1").await.unwrap();
        assert!(matches!(registry.create("r1").await, Err(ServiceError::DuplicateRun(_))));
        assert!(registry.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_keeps_submission_order() {
        let registry = InMemoryRegistry::new();
        for id in ["c", "a", "b"] {
            registry.create(id).await.unwrap();
        }
        let ids: Vec<String> = registry.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TaskStatus::Processing).unwrap(), "\"processing\"");
    }
}
