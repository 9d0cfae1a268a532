//! Agent role types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::finding::FindingCategory;

/// The five pipeline roles, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Security,
    Quality,
    Logic,
    Context,
    Decision,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Security,
        AgentRole::Quality,
        AgentRole::Logic,
        AgentRole::Context,
        AgentRole::Decision,
    ];

    /// The three fan-out analyzers.
    pub const ANALYZERS: [AgentRole; 3] = [AgentRole::Security, AgentRole::Quality, AgentRole::Logic];

    /// The finding category an analyzer role produces.
    pub fn category(self) -> Option<FindingCategory> {
        match self {
            AgentRole::Security => Some(FindingCategory::Security),
            AgentRole::Quality => Some(FindingCategory::Quality),
            AgentRole::Logic => Some(FindingCategory::Logic),
            AgentRole::Context | AgentRole::Decision => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Security => "security",
            AgentRole::Quality => "quality",
            AgentRole::Logic => "logic",
            AgentRole::Context => "context",
            AgentRole::Decision => "decision",
        }
    }
}

impl From<FindingCategory> for AgentRole {
    fn from(category: FindingCategory) -> Self {
        match category {
            FindingCategory::Security => AgentRole::Security,
            FindingCategory::Quality => AgentRole::Quality,
            FindingCategory::Logic => AgentRole::Logic,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzer_roles_map_to_categories() {
        for role in AgentRole::ANALYZERS {
            let category = role.category().unwrap();
            assert_eq!(AgentRole::from(category), role);
        }
        assert_eq!(AgentRole::Context.category(), None);
        assert_eq!(AgentRole::Decision.category(), None);
    }
}
