//! In-memory agent registry
//!
//! Populated once from the fixed definition list at startup; all lookups
//! are O(1) map reads. Safe for concurrent reads from process start.

use std::collections::HashMap;

use super::definitions::{builtin_agents, AgentDefinition};

pub struct AgentRegistry {
    agents: HashMap<&'static str, AgentDefinition>,
}

impl AgentRegistry {
    /// Build the registry from the built-in definition list.
    pub fn builtin() -> Self {
        Self::from_definitions(builtin_agents())
    }

    /// Build a registry from an explicit definition list (for tests).
    pub fn from_definitions(definitions: Vec<AgentDefinition>) -> Self {
        let agents = definitions.into_iter().map(|d| (d.name, d)).collect();
        Self { agents }
    }

    pub fn get(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.get(name)
    }

    /// Whether the named agent may operate in the given lane.
    ///
    /// Unknown agents are not allowed anywhere.
    pub fn is_allowed_in_lane(&self, name: &str, lane_number: i64) -> bool {
        self.agents
            .get(name)
            .map(|a| a.allowed_lanes.contains(&lane_number))
            .unwrap_or(false)
    }

    /// All agents permitted in the given lane.
    pub fn by_lane(&self, lane_number: i64) -> Vec<&AgentDefinition> {
        let mut agents: Vec<_> = self
            .agents
            .values()
            .filter(|a| a.allowed_lanes.contains(&lane_number))
            .collect();
        agents.sort_by_key(|a| a.name);
        agents
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.agents.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = AgentRegistry::builtin();
        assert!(registry.get("frontend-agent").is_some());
        assert!(registry.get("no-such-agent").is_none());
    }

    #[test]
    fn test_lane_permission() {
        let registry = AgentRegistry::builtin();
        assert!(registry.is_allowed_in_lane("frontend-agent", 6));
        assert!(!registry.is_allowed_in_lane("frontend-agent", 1));
        assert!(!registry.is_allowed_in_lane("no-such-agent", 6));
    }

    #[test]
    fn test_by_lane_includes_orchestrator_everywhere() {
        let registry = AgentRegistry::builtin();
        for lane in 0..=10 {
            assert!(
                registry.by_lane(lane).iter().any(|a| a.name == "orchestrator"),
                "orchestrator missing from lane {lane}"
            );
        }
    }
}
