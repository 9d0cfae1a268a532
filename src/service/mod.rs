//! Background execution of runs.
//!
//! `submit` returns a run id immediately. A worker waits for a slot in
//! the bounded pool, runs the orchestrator and records the outcome in the
//! task registry. Completed runs feed their findings back into memory and
//! hand their patches to the patch sink.

pub mod registry;
pub mod sink;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Notify, Semaphore};
use tokio_util::task::TaskTracker;

use crate::memory::{MemoryRecord, SimilarityMemory};
use crate::models::{AnalysisContext, RunReport, Stage, WorkflowState};
use crate::orchestrator::{Orchestrator, OrchestratorError};

pub use registry::{InMemoryRegistry, TaskRecord, TaskRegistry, TaskStatus};
pub use sink::{DirectoryPatchSink, PatchSink};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("unknown run `{0}`")]
    UnknownRun(String),

    #[error("run `{0}` already exists")]
    DuplicateRun(String),

    #[error("service is shutting down")]
    ShuttingDown,

    #[error("worker for run `{run_id}` stopped unexpectedly: {message}")]
    Worker { run_id: String, message: String },

    #[error("failed to write patch {path}: {source}")]
    Sink {
        path: String,
        source: std::io::Error,
    },
}

/// Service knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Concurrent runs.
    pub pool_size: usize,
    /// Append findings of completed runs to memory.
    pub record_findings: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            pool_size: 4,
            record_findings: true,
        }
    }
}

/// Everything a worker needs, shared by all workers.
struct Shared {
    orchestrator: Orchestrator,
    registry: Arc<dyn TaskRegistry>,
    memory: Arc<dyn SimilarityMemory>,
    sink: Option<Arc<dyn PatchSink>>,
    record_findings: bool,
    /// Woken whenever a run reaches a finished status.
    finished: Notify,
}

pub struct AnalysisService {
    shared: Arc<Shared>,
    pool: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl AnalysisService {
    pub fn new(
        orchestrator: Orchestrator,
        registry: Arc<dyn TaskRegistry>,
        memory: Arc<dyn SimilarityMemory>,
        sink: Option<Arc<dyn PatchSink>>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                orchestrator,
                registry,
                memory,
                sink,
                record_findings: options.record_findings,
                finished: Notify::new(),
            }),
            pool: Arc::new(Semaphore::new(options.pool_size.max(1))),
            tracker: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &Arc<dyn TaskRegistry> {
        &self.shared.registry
    }

    /// Queue a run. Never waits for analysis.
    pub async fn submit(&self, context: AnalysisContext) -> Result<String, ServiceError> {
        if self.tracker.is_closed() {
            return Err(ServiceError::ShuttingDown);
        }
        let run_id = uuid::Uuid::new_v4().to_string();
        self.shared.registry.create(&run_id).await?;
        tracing::info!(run_id = %run_id, repo = %context.repo, "run queued");

        let shared = self.shared.clone();
        let pool = self.pool.clone();
        let id = run_id.clone();
        self.tracker.spawn(async move {
            let Ok(_permit) = pool.acquire_owned().await else {
                return;
            };
            shared.work(id, context).await;
        });
        Ok(run_id)
    }

    /// Wait for a run to reach `completed` or `error` and return its record.
    pub async fn wait(&self, run_id: &str) -> Result<TaskRecord, ServiceError> {
        loop {
            let notified = self.shared.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let record = self
                .shared
                .registry
                .get(run_id)
                .await?
                .ok_or_else(|| ServiceError::UnknownRun(run_id.to_string()))?;
            if record.status.is_finished() {
                return Ok(record);
            }
            notified.await;
        }
    }

    /// Stop accepting runs and wait for the queued ones to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Shared {
    /// Run one analysis on its own task so a panic still ends in a
    /// finished status.
    async fn work(self: Arc<Self>, run_id: String, context: AnalysisContext) {
        let inner = self.clone();
        let id = run_id.clone();
        let outcome = match tokio::spawn(async move { inner.execute(&id, context).await }).await {
            Ok(result) => result,
            Err(e) => {
                let err = ServiceError::Worker {
                    run_id: run_id.clone(),
                    message: e.to_string(),
                };
                tracing::error!(run_id = %run_id, error = %err, "worker stopped");
                self.registry.fail(&run_id, err.to_string()).await
            }
        };
        if let Err(e) = outcome {
            tracing::error!(run_id = %run_id, error = %e, "failed to record run outcome");
        }
        self.finished.notify_waiters();
    }

    async fn execute(&self, run_id: &str, context: AnalysisContext) -> Result<(), ServiceError> {
        self.registry.mark_processing(run_id).await?;

        match self.orchestrator.run_with_id(run_id.to_string(), context).await {
            Ok(state) => {
                if state.stage == Stage::Done {
                    self.remember(&state).await;
                    self.deliver(&state).await;
                }
                self.registry.complete(run_id, RunReport::from(&state)).await
            }
            Err(OrchestratorError::Validation(e)) => {
                tracing::warn!(run_id, error = %e, "run rejected");
                self.registry.fail(run_id, e.to_string()).await
            }
        }
    }

    async fn remember(&self, state: &WorkflowState) {
        if !self.record_findings {
            return;
        }
        let ctx = &state.context;
        for finding in state.all_findings() {
            let record = MemoryRecord::from_finding(&state.run_id, &ctx.repo, &ctx.author, finding);
            if let Err(e) = self.memory.upsert(record).await {
                tracing::warn!(run_id = %state.run_id, error = %e, "failed to record finding in memory");
                return;
            }
        }
    }

    async fn deliver(&self, state: &WorkflowState) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(e) = sink.accept(&state.run_id, &state.patches).await {
            tracing::warn!(run_id = %state.run_id, error = %e, "patch sink rejected patches");
        }
    }
}
