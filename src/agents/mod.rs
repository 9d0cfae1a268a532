//! Agent roles and the startup registry.
//!
//! All five roles share one capability, [`Agent::run`], which reads a
//! snapshot of the run state and returns a partial update. The
//! orchestrator is the only writer and applies updates itself.

pub mod analyzer;
pub mod decision;
pub mod enrichment;
pub mod parser;
pub mod patch;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;

use crate::config::Config;
use crate::heuristics::RuleSet;
use crate::memory::SimilarityMemory;
use crate::models::{
    AgentResponse, AgentRole, Decision, Enrichment, FindingCategory, Patch, WorkflowState,
};
use crate::providers::ReasoningProvider;

pub use analyzer::Analyzer;
pub use decision::DecisionAgent;
pub use enrichment::ContextEnricher;

/// Unexpected failures inside an agent. Provider and parse problems are
/// not errors; analyzers recover from them locally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("{role} agent returned an update for the wrong stage")]
    UnexpectedUpdate { role: AgentRole },
}

/// Errors building the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no agent registered for role `{0}`")]
    MissingRole(AgentRole),

    #[error("agent registered under `{expected}` reports role `{actual}`")]
    RoleMismatch { expected: AgentRole, actual: AgentRole },
}

/// Partial state produced by one agent.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    Findings {
        category: FindingCategory,
        response: AgentResponse,
    },
    Enrichment(Enrichment),
    Decision {
        decision: Decision,
        patches: Vec<Patch>,
    },
}

/// The capability shared by every agent role.
#[async_trait]
pub trait Agent: Send + Sync {
    fn role(&self) -> AgentRole;

    async fn run(&self, state: Arc<WorkflowState>) -> Result<StateUpdate, AgentError>;
}

/// Fixed role-to-implementation table, resolved once at startup.
#[derive(Clone)]
pub struct AgentRegistry {
    agents: IndexMap<AgentRole, Arc<dyn Agent>>,
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("roles", &self.agents.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::default()
    }

    /// The default implementation of every role.
    pub fn standard(
        config: &Config,
        provider: Arc<dyn ReasoningProvider>,
        memory: Arc<dyn SimilarityMemory>,
        rules: Arc<RuleSet>,
    ) -> Result<Self, RegistryError> {
        let policy = config.retry_policy();
        let mut builder = Self::builder();
        for category in FindingCategory::ALL {
            let role = AgentRole::from(category);
            builder = builder.register(Arc::new(Analyzer::new(
                category,
                provider.clone(),
                config.model_for(role),
                config.agents.tuning(role).temperature,
                policy,
                rules.clone(),
            )));
        }
        builder
            .register(Arc::new(ContextEnricher::new(memory, config.enrichment.clone())))
            .register(Arc::new(DecisionAgent))
            .build()
    }

    /// The agent for `role`. Every role is present once built.
    pub fn get(&self, role: AgentRole) -> Arc<dyn Agent> {
        self.agents[&role].clone()
    }

    pub fn roles(&self) -> impl Iterator<Item = AgentRole> + '_ {
        self.agents.keys().copied()
    }
}

#[derive(Default)]
pub struct AgentRegistryBuilder {
    agents: IndexMap<AgentRole, Arc<dyn Agent>>,
    mismatch: Option<RegistryError>,
}

impl AgentRegistryBuilder {
    /// Register an agent under the role it reports.
    pub fn register(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.insert(agent.role(), agent);
        self
    }

    /// Register an agent under an explicit role.
    pub fn register_as(mut self, role: AgentRole, agent: Arc<dyn Agent>) -> Self {
        if agent.role() != role && self.mismatch.is_none() {
            self.mismatch = Some(RegistryError::RoleMismatch {
                expected: role,
                actual: agent.role(),
            });
        }
        self.agents.insert(role, agent);
        self
    }

    pub fn build(self) -> Result<AgentRegistry, RegistryError> {
        if let Some(err) = self.mismatch {
            return Err(err);
        }
        if let Some(missing) = AgentRole::ALL.into_iter().find(|r| !self.agents.contains_key(r)) {
            return Err(RegistryError::MissingRole(missing));
        }
        let mut agents = self.agents;
        agents.sort_keys();
        Ok(AgentRegistry { agents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::providers::UnavailableProvider;

    fn standard() -> AgentRegistry {
        AgentRegistry::standard(
            &Config::default(),
            Arc::new(UnavailableProvider::new("offline")),
            Arc::new(InMemoryStore::new()),
            Arc::new(RuleSet::builtin()),
        )
        .unwrap()
    }

    #[test]
    fn standard_registry_has_every_role_in_order() {
        let registry = standard();
        let roles: Vec<AgentRole> = registry.roles().collect();
        assert_eq!(roles, AgentRole::ALL.to_vec());
        for role in AgentRole::ALL {
            assert_eq!(registry.get(role).role(), role);
        }
    }

    #[test]
    fn missing_role_fails_build() {
        let err = AgentRegistry::builder()
            .register(Arc::new(DecisionAgent))
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::MissingRole(AgentRole::Security));
    }

    #[test]
    fn mismatched_role_fails_build() {
        let err = AgentRegistry::builder()
            .register_as(AgentRole::Security, Arc::new(DecisionAgent))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::RoleMismatch {
                expected: AgentRole::Security,
                actual: AgentRole::Decision,
            }
        );
    }
}
