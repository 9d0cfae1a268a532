//! Workflow state machine.
//!
//! One run walks `init -> analyzing -> routing -> (enriching ->) deciding
//! -> done`, or ends in `failed`. Every move goes through the transition
//! table, so the reachable paths are exactly the rows of [`TRANSITIONS`].
//!
//! Agents only ever see an immutable snapshot of the state. The
//! orchestrator applies their updates itself, so it is the single writer.

use std::sync::Arc;

use thiserror::Error;

use crate::agents::{AgentError, AgentRegistry, StateUpdate};
use crate::models::{
    AgentRole, AnalysisContext, Finding, FindingCategory, Severity, Stage, ValidationError,
    WorkflowState,
};

/// Errors returned instead of a state. Everything else ends in `failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("invalid analysis context: {0}")]
    Validation(#[from] ValidationError),
}

/// Events that move the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Validated,
    AnalyzersJoined,
    /// At least one critical security finding.
    CriticalSecurity,
    NoCritical,
    Enriched,
    Decided,
    Fault,
}

/// Every defined `(from, signal) -> to` move except faults.
pub const TRANSITIONS: &[(Stage, Signal, Stage)] = &[
    (Stage::Init, Signal::Validated, Stage::Analyzing),
    (Stage::Analyzing, Signal::AnalyzersJoined, Stage::Routing),
    (Stage::Routing, Signal::CriticalSecurity, Stage::Deciding),
    (Stage::Routing, Signal::NoCritical, Stage::Enriching),
    (Stage::Enriching, Signal::Enriched, Stage::Deciding),
    (Stage::Deciding, Signal::Decided, Stage::Done),
];

/// The stage `signal` leads to from `stage`, if that move is defined.
/// A fault leads to `failed` from any non-terminal stage.
pub fn next_stage(stage: Stage, signal: Signal) -> Option<Stage> {
    if signal == Signal::Fault {
        return (!stage.is_terminal()).then_some(Stage::Failed);
    }
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == stage && *on == signal)
        .map(|(_, _, to)| *to)
}

/// Routing decision over the joined security findings.
pub fn route(security: &[Finding]) -> Signal {
    if security.iter().any(|f| f.severity == Severity::Critical) {
        Signal::CriticalSecurity
    } else {
        Signal::NoCritical
    }
}

/// A node fault: recorded on the state, ends the run in `failed`.
#[derive(Debug)]
struct Fault(String);

pub struct Orchestrator {
    registry: AgentRegistry,
}

impl Orchestrator {
    pub fn new(registry: AgentRegistry) -> Self {
        Self { registry }
    }

    /// Run one context under a fresh run id.
    pub async fn run(&self, context: AnalysisContext) -> Result<WorkflowState, OrchestratorError> {
        self.run_with_id(uuid::Uuid::new_v4().to_string(), context).await
    }

    /// Run one context to `done` or `failed`.
    pub async fn run_with_id(
        &self,
        run_id: String,
        context: AnalysisContext,
    ) -> Result<WorkflowState, OrchestratorError> {
        context.validate()?;

        let mut state = WorkflowState::new(run_id, Arc::new(context));
        tracing::info!(
            run_id = %state.run_id,
            repo = %state.context.repo,
            snippets = state.context.snippets.len(),
            "run started"
        );

        if let Err(Fault(message)) = self.drive(&mut state).await {
            tracing::error!(run_id = %state.run_id, stage = %state.stage, error = %message, "run failed");
            state.errors.push(message);
            state.enter(Stage::Failed);
        } else {
            tracing::info!(
                run_id = %state.run_id,
                verdict = %state.decision.as_ref().map(|d| d.verdict.to_string()).unwrap_or_default(),
                "run finished"
            );
        }

        Ok(state)
    }

    async fn drive(&self, state: &mut WorkflowState) -> Result<(), Fault> {
        advance(state, Signal::Validated)?;

        self.analyze(state).await?;
        advance(state, Signal::AnalyzersJoined)?;

        let signal = route(state.findings(FindingCategory::Security));
        advance(state, signal)?;

        if state.stage == Stage::Enriching {
            let update = self.invoke(AgentRole::Context, state).await?;
            apply(state, AgentRole::Context, update)?;
            advance(state, Signal::Enriched)?;
        }

        let update = self.invoke(AgentRole::Decision, state).await?;
        apply(state, AgentRole::Decision, update)?;
        advance(state, Signal::Decided)
    }

    /// Fan out the three analyzers on one snapshot and join them all.
    ///
    /// Results of healthy analyzers are applied even when another one
    /// faults.
    async fn analyze(&self, state: &mut WorkflowState) -> Result<(), Fault> {
        let snapshot = Arc::new(state.clone());
        let handles: Vec<_> = AgentRole::ANALYZERS
            .into_iter()
            .map(|role| {
                let agent = self.registry.get(role);
                let snapshot = snapshot.clone();
                (role, tokio::spawn(async move { agent.run(snapshot).await }))
            })
            .collect();

        let mut faults = Vec::new();
        for (role, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(update)) => apply(state, role, update),
                Ok(Err(e)) => Err(Fault(e.to_string())),
                Err(e) => Err(Fault(format!("{role} agent panicked: {e}"))),
            };
            if let Err(Fault(message)) = outcome {
                tracing::warn!(run_id = %state.run_id, %role, error = %message, "analyzer fault");
                faults.push(message);
            }
        }

        match faults.len() {
            0 => Ok(()),
            1 => Err(Fault(faults.remove(0))),
            _ => {
                let last = faults.pop().unwrap_or_default();
                state.errors.extend(faults);
                Err(Fault(last))
            }
        }
    }

    /// Run a single agent on a snapshot, catching panics.
    async fn invoke(&self, role: AgentRole, state: &WorkflowState) -> Result<StateUpdate, Fault> {
        let agent = self.registry.get(role);
        let snapshot = Arc::new(state.clone());
        match tokio::spawn(async move { agent.run(snapshot).await }).await {
            Ok(Ok(update)) => Ok(update),
            Ok(Err(e)) => Err(Fault(e.to_string())),
            Err(e) => Err(Fault(format!("{role} agent panicked: {e}"))),
        }
    }
}

fn advance(state: &mut WorkflowState, signal: Signal) -> Result<(), Fault> {
    let next = next_stage(state.stage, signal).ok_or_else(|| {
        Fault(format!("no transition from `{}` on {signal:?}", state.stage))
    })?;
    tracing::debug!(run_id = %state.run_id, from = %state.stage, to = %next, "transition");
    state.enter(next);
    Ok(())
}

/// Write an agent's update into the state, checking it belongs to `role`.
fn apply(state: &mut WorkflowState, role: AgentRole, update: StateUpdate) -> Result<(), Fault> {
    match (role, update) {
        (role, StateUpdate::Findings { category, response }) if role.category() == Some(category) => {
            state.set_response(category, response);
        }
        (AgentRole::Context, StateUpdate::Enrichment(enrichment)) => {
            state.enrichment = Some(enrichment);
        }
        (AgentRole::Decision, StateUpdate::Decision { decision, patches }) => {
            state.decision = Some(decision);
            state.patches = patches;
        }
        (role, _) => return Err(Fault(AgentError::UnexpectedUpdate { role }.to_string())),
    }
    Ok(())
}
