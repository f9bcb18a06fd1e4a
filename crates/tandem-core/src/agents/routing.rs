//! Agent routing table
//!
//! An explicit, constructed value passed into the components that need it,
//! so the core stays testable with substitute tables. The alias table maps
//! free-text synonyms to canonical agent names; it is used only when
//! interpreting natural-language mentions, never for permission decisions.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::definitions::BASELINE_AGENT;

/// Last-resort route when a table carries no baseline entry: inbox lane,
/// all lanes allowed, medium priority.
static FALLBACK_ROUTE: Lazy<AgentRoute> = Lazy::new(|| AgentRoute {
    allowed_lanes: (0..=10).collect(),
    default_lane: 0,
    default_priority: "medium",
});

/// Per-agent routing defaults for new-card placement.
#[derive(Debug, Clone)]
pub struct AgentRoute {
    pub allowed_lanes: Vec<i64>,
    /// Lane new cards land in when the directive names no lane.
    pub default_lane: i64,
    pub default_priority: &'static str,
}

pub struct AgentRoutingTable {
    routes: HashMap<&'static str, AgentRoute>,
    aliases: HashMap<&'static str, &'static str>,
}

impl AgentRoutingTable {
    /// Routing defaults for the built-in agent catalog.
    pub fn builtin() -> Self {
        let mut routes = HashMap::new();
        routes.insert(
            "orchestrator",
            AgentRoute {
                allowed_lanes: (0..=10).collect(),
                default_lane: 0,
                default_priority: "medium",
            },
        );
        routes.insert(
            "research-agent",
            AgentRoute {
                allowed_lanes: vec![0, 1, 2, 3],
                default_lane: 1,
                default_priority: "medium",
            },
        );
        routes.insert(
            "architect-agent",
            AgentRoute {
                allowed_lanes: vec![3, 4, 5, 8],
                default_lane: 4,
                default_priority: "high",
            },
        );
        routes.insert(
            "frontend-agent",
            AgentRoute {
                allowed_lanes: vec![5, 6, 7],
                default_lane: 6,
                default_priority: "medium",
            },
        );
        routes.insert(
            "backend-agent",
            AgentRoute {
                allowed_lanes: vec![4, 5, 6, 7],
                default_lane: 6,
                default_priority: "high",
            },
        );
        routes.insert(
            "qa-agent",
            AgentRoute {
                allowed_lanes: vec![6, 7, 8],
                default_lane: 7,
                default_priority: "medium",
            },
        );
        routes.insert(
            "devops-agent",
            AgentRoute {
                allowed_lanes: vec![6, 9, 10],
                default_lane: 9,
                default_priority: "low",
            },
        );

        let aliases = HashMap::from([
            ("frontend", "frontend-agent"),
            ("ui", "frontend-agent"),
            ("design", "frontend-agent"),
            ("backend", "backend-agent"),
            ("api", "backend-agent"),
            ("server", "backend-agent"),
            ("qa", "qa-agent"),
            ("testing", "qa-agent"),
            ("quality", "qa-agent"),
            ("devops", "devops-agent"),
            ("infra", "devops-agent"),
            ("deployment", "devops-agent"),
            ("research", "research-agent"),
            ("discovery", "research-agent"),
            ("architect", "architect-agent"),
            ("architecture", "architect-agent"),
            ("pm", "orchestrator"),
            ("coordinator", "orchestrator"),
        ]);

        Self { routes, aliases }
    }

    /// Build a table from explicit routes (for tests).
    pub fn from_routes(routes: HashMap<&'static str, AgentRoute>) -> Self {
        Self {
            routes,
            aliases: HashMap::new(),
        }
    }

    pub fn route(&self, agent: &str) -> Option<&AgentRoute> {
        self.routes.get(agent)
    }

    /// Route for the agent, falling back to the baseline agent when the
    /// name is unknown or unspecified, and to a permissive inbox route
    /// when the table has no baseline entry either.
    pub fn route_or_baseline(&self, agent: Option<&str>) -> &AgentRoute {
        agent
            .and_then(|a| self.routes.get(a))
            .or_else(|| self.routes.get(BASELINE_AGENT))
            .unwrap_or(&FALLBACK_ROUTE)
    }

    /// Resolve a free-text mention ("frontend", "ui", ...) to a canonical
    /// agent name. Canonical names resolve to themselves.
    pub fn resolve_mention(&self, mention: &str) -> Option<&'static str> {
        let needle = mention.trim().to_lowercase();
        if let Some((name, _)) = self.routes.get_key_value(needle.as_str()) {
            return Some(name);
        }
        self.aliases.get(needle.as_str()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_routes_cover_catalog() {
        let table = AgentRoutingTable::builtin();
        for name in crate::agents::AgentRegistry::builtin().names() {
            let route = table.route(name).expect("every agent has a route");
            assert!(
                route.allowed_lanes.contains(&route.default_lane),
                "{name} default lane outside its allowed lanes"
            );
        }
    }

    #[test]
    fn test_baseline_fallback() {
        let table = AgentRoutingTable::builtin();
        assert_eq!(table.route_or_baseline(None).default_lane, 0);
        assert_eq!(table.route_or_baseline(Some("nonsense")).default_lane, 0);
        assert_eq!(
            table.route_or_baseline(Some("frontend-agent")).default_lane,
            6
        );
    }

    #[test]
    fn test_baseline_fallback_without_baseline_route() {
        let table = AgentRoutingTable::from_routes(HashMap::new());
        let route = table.route_or_baseline(Some("frontend-agent"));
        assert_eq!(route.default_lane, 0);
        assert!(route.allowed_lanes.contains(&10));
    }

    #[test]
    fn test_alias_resolution() {
        let table = AgentRoutingTable::builtin();
        assert_eq!(table.resolve_mention("UI"), Some("frontend-agent"));
        assert_eq!(table.resolve_mention("frontend-agent"), Some("frontend-agent"));
        assert_eq!(table.resolve_mention("blockchain"), None);
    }
}
