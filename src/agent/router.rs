//! Name → agent lookup shared by every agent

use eyre::Result;
use indexmap::IndexMap;

use super::Agent;

/// Insertion-ordered, immutable set of agents
pub struct AgentRouter {
    agents: IndexMap<String, Agent>,
}

impl AgentRouter {
    /// Build the router; agent names must be unique
    pub fn new(agents: Vec<Agent>) -> Result<Self> {
        let mut map = IndexMap::with_capacity(agents.len());
        for agent in agents {
            let name = agent.name().to_string();
            if map.contains_key(&name) {
                eyre::bail!("Agent '{}' registered twice", name);
            }
            map.insert(name, agent);
        }
        Ok(Self { agents: map })
    }

    /// Exact name first, then ASCII case-insensitive
    pub fn lookup(&self, name: &str) -> Option<&Agent> {
        self.agents
            .get(name)
            .or_else(|| self.agents.values().find(|a| a.name().eq_ignore_ascii_case(name)))
    }

    /// Resolve `name` as a delegation peer of `from`; an agent is never its own peer
    pub fn peer(&self, from: &str, name: &str) -> Option<&Agent> {
        self.lookup(name).filter(|agent| agent.name() != from)
    }

    /// First registered agent, the supervisor's own voice
    pub fn first(&self) -> Option<&Agent> {
        self.agents.values().next()
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Persona;
    use crate::capability::CapabilityRegistry;
    use std::sync::Arc;
    use std::time::Duration;

    fn agents(names: &[&str]) -> Vec<Agent> {
        let registry = Arc::new(CapabilityRegistry::new(Duration::from_secs(1)).unwrap());
        names
            .iter()
            .map(|n| Agent::new(Persona::anonymous(n), registry.clone(), None, 4))
            .collect()
    }

    #[test]
    fn test_keeps_insertion_order() {
        let router = AgentRouter::new(agents(&["zed", "alice", "bob"])).unwrap();
        assert_eq!(router.names(), vec!["zed", "alice", "bob"]);
        assert_eq!(router.first().map(|a| a.name()), Some("zed"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        assert!(AgentRouter::new(agents(&["a", "a"])).is_err());
    }

    #[test]
    fn test_lookup_prefers_exact_match() {
        let router = AgentRouter::new(agents(&["bob", "Bob"])).unwrap();
        assert_eq!(router.lookup("Bob").map(|a| a.name()), Some("Bob"));
        assert_eq!(router.lookup("BOB").map(|a| a.name()), Some("bob"));
        assert!(router.lookup("carol").is_none());
    }

    #[test]
    fn test_agent_is_not_its_own_peer() {
        let router = AgentRouter::new(agents(&["alice", "bob"])).unwrap();
        assert!(router.peer("alice", "alice").is_none());
        assert!(router.peer("alice", "ALICE").is_none());
        assert_eq!(router.peer("alice", "bob").map(|a| a.name()), Some("bob"));
    }
}
