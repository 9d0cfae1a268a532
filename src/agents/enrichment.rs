//! Context Enrichment Agent.
//!
//! Looks every finding up in similarity memory, scoped to the run's
//! repository and author, and writes an overlay of adjusted severities.
//! Recurring findings go up one level; findings that developers keep
//! marking as false positives go down one level, and that wins over
//! recurrence. Memory problems become notes, never run failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use super::{Agent, AgentError, StateUpdate};
use crate::config::EnrichmentConfig;
use crate::memory::{MemoryQuery, ScoredRecord, SimilarityMemory, author_key, memory_key};
use crate::models::{AgentRole, Enrichment, Finding, WorkflowState};

pub struct ContextEnricher {
    memory: Arc<dyn SimilarityMemory>,
    config: EnrichmentConfig,
}

/// What memory says about one finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    Escalate,
    DeEscalate,
}

impl ContextEnricher {
    pub fn new(memory: Arc<dyn SimilarityMemory>, config: EnrichmentConfig) -> Self {
        Self { memory, config }
    }

    /// Build the severity overlay for `state`. Original findings are untouched.
    pub async fn enrich(&self, state: &WorkflowState) -> Enrichment {
        let context = &state.context;
        let mut enrichment = Enrichment {
            memory_key: memory_key(&context.repo, &context.author),
            ..Default::default()
        };
        let author = author_key(&context.author);
        let query_timeout = Duration::from_millis(self.config.query_timeout_ms);

        for finding in state.all_findings() {
            let query = MemoryQuery {
                text: finding.description.clone(),
                k: self.config.top_k,
                repo: Some(context.repo.clone()),
                author_key: Some(author.clone()),
            };

            let matches = match timeout(query_timeout, self.memory.query(&query)).await {
                Ok(Ok(results)) => results,
                Ok(Err(e)) => {
                    tracing::warn!(run_id = %state.run_id, finding = %finding.id, error = %e, "memory query failed");
                    enrichment.notes.push(format!("{}: memory query failed: {e}", finding.id));
                    continue;
                }
                Err(_) => {
                    tracing::warn!(run_id = %state.run_id, finding = %finding.id, "memory query timed out");
                    enrichment.notes.push(format!(
                        "{}: memory query timed out after {}ms",
                        finding.id, self.config.query_timeout_ms
                    ));
                    continue;
                }
            };

            if let Some((adjustment, note)) = self.assess(finding, &matches) {
                let adjusted = match adjustment {
                    Adjustment::Escalate => finding.severity.escalate(),
                    Adjustment::DeEscalate => finding.severity.de_escalate(),
                };
                if adjusted != finding.severity {
                    enrichment.adjusted.insert(finding.id.clone(), adjusted);
                }
                enrichment.notes.push(note);
            }
        }

        enrichment
    }

    fn assess(&self, finding: &Finding, results: &[ScoredRecord]) -> Option<(Adjustment, String)> {
        let matches: Vec<&ScoredRecord> = results
            .iter()
            .filter(|r| r.score >= self.config.similarity_threshold)
            .collect();
        if matches.is_empty() {
            return None;
        }

        let false_positives = matches.iter().filter(|m| m.record.false_positive).count();
        let recurrences = matches.len() - false_positives;
        let fp_rate = false_positives as f64 / matches.len() as f64;

        if fp_rate > self.config.false_positive_rate {
            Some((
                Adjustment::DeEscalate,
                format!(
                    "{}: {} of {} similar findings were marked false positive, {} -> {}",
                    finding.id,
                    false_positives,
                    matches.len(),
                    finding.severity,
                    finding.severity.de_escalate()
                ),
            ))
        } else if recurrences > self.config.recurrence_threshold {
            Some((
                Adjustment::Escalate,
                format!(
                    "{}: recurred {} times for this author, {} -> {}",
                    finding.id,
                    recurrences,
                    finding.severity,
                    finding.severity.escalate()
                ),
            ))
        } else {
            None
        }
    }
}

#[async_trait]
impl Agent for ContextEnricher {
    fn role(&self) -> AgentRole {
        AgentRole::Context
    }

    async fn run(&self, state: Arc<WorkflowState>) -> Result<StateUpdate, AgentError> {
        Ok(StateUpdate::Enrichment(self.enrich(&state).await))
    }
}
