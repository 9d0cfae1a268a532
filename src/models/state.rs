//! Per-run pipeline state.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::context::AnalysisContext;
use super::decision::{Decision, Patch};
use super::finding::{Finding, FindingCategory, Severity};

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Init,
    Analyzing,
    Routing,
    Enriching,
    Deciding,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Analyzing => "analyzing",
            Stage::Routing => "routing",
            Stage::Enriching => "enriching",
            Stage::Deciding => "deciding",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one analyzer invocation.
///
/// `success == false` still carries whatever findings were produced,
/// typically the fallback heuristic results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    pub findings: Vec<Finding>,
    pub errors: Vec<String>,
    pub metadata: IndexMap<String, serde_json::Value>,
}

/// Severity overlay written by the enrichment stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    /// `repo:sha256(author)` scope used for memory lookups.
    pub memory_key: String,
    /// Finding id to adjusted severity. Original findings are untouched.
    pub adjusted: IndexMap<String, Severity>,
    pub notes: Vec<String>,
}

/// Mutable state of one run. Owned by exactly one orchestrator invocation.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub run_id: String,
    pub context: Arc<AnalysisContext>,
    pub stage: Stage,
    /// Every stage entered, in order.
    pub trail: Vec<Stage>,
    pub security: Option<AgentResponse>,
    pub quality: Option<AgentResponse>,
    pub logic: Option<AgentResponse>,
    pub enrichment: Option<Enrichment>,
    pub decision: Option<Decision>,
    pub patches: Vec<Patch>,
    /// Error annotations from node faults.
    pub errors: Vec<String>,
}

impl WorkflowState {
    pub fn new(run_id: impl Into<String>, context: Arc<AnalysisContext>) -> Self {
        Self {
            run_id: run_id.into(),
            context,
            stage: Stage::Init,
            trail: vec![Stage::Init],
            security: None,
            quality: None,
            logic: None,
            enrichment: None,
            decision: None,
            patches: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Move to `stage` and record it in the trail.
    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.trail.push(stage);
    }

    pub fn response(&self, category: FindingCategory) -> Option<&AgentResponse> {
        match category {
            FindingCategory::Security => self.security.as_ref(),
            FindingCategory::Quality => self.quality.as_ref(),
            FindingCategory::Logic => self.logic.as_ref(),
        }
    }

    /// Store an analyzer's response in its own slot.
    pub fn set_response(&mut self, category: FindingCategory, response: AgentResponse) {
        let slot = match category {
            FindingCategory::Security => &mut self.security,
            FindingCategory::Quality => &mut self.quality,
            FindingCategory::Logic => &mut self.logic,
        };
        *slot = Some(response);
    }

    pub fn findings(&self, category: FindingCategory) -> &[Finding] {
        self.response(category)
            .map(|r| r.findings.as_slice())
            .unwrap_or(&[])
    }

    /// All findings in category order, generation order within a category.
    pub fn all_findings(&self) -> impl Iterator<Item = &Finding> {
        FindingCategory::ALL
            .into_iter()
            .flat_map(move |c| self.findings(c).iter())
    }

    /// Severity after the enrichment overlay.
    pub fn effective_severity(&self, finding: &Finding) -> Severity {
        self.enrichment
            .as_ref()
            .and_then(|e| e.adjusted.get(&finding.id).copied())
            .unwrap_or(finding.severity)
    }
}

/// Serializable final result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub repo: String,
    pub change_id: String,
    pub stage: Stage,
    pub trail: Vec<Stage>,
    pub security: Option<AgentResponse>,
    pub quality: Option<AgentResponse>,
    pub logic: Option<AgentResponse>,
    pub enrichment: Option<Enrichment>,
    pub decision: Option<Decision>,
    pub patches: Vec<Patch>,
    pub errors: Vec<String>,
}

impl From<&WorkflowState> for RunReport {
    fn from(state: &WorkflowState) -> Self {
        Self {
            run_id: state.run_id.clone(),
            repo: state.context.repo.clone(),
            change_id: state.context.change_id.clone(),
            stage: state.stage,
            trail: state.trail.clone(),
            security: state.security.clone(),
            quality: state.quality.clone(),
            logic: state.logic.clone(),
            enrichment: state.enrichment.clone(),
            decision: state.decision.clone(),
            patches: state.patches.clone(),
            errors: state.errors.clone(),
        }
    }
}

impl RunReport {
    /// All findings in category order.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        [&self.security, &self.quality, &self.logic]
            .into_iter()
            .flatten()
            .flat_map(|r| r.findings.iter())
    }

    pub fn effective_severity(&self, finding: &Finding) -> Severity {
        self.enrichment
            .as_ref()
            .and_then(|e| e.adjusted.get(&finding.id).copied())
            .unwrap_or(finding.severity)
    }
}
