//! Agent capability registry.
//!
//! Maps an abstract role to the pool of agents that can perform it.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use taskloom_protocols::Agent;

use crate::error::RegistryError;

/// Agents able to perform one role, with a round-robin cursor for load
/// distribution.
pub struct AgentPool {
    role: String,
    members: Vec<Arc<dyn Agent>>,
    cursor: AtomicUsize,
}

impl AgentPool {
    /// Create a pool for `role`.
    pub fn new(role: impl Into<String>, members: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            role: role.into(),
            members,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Get a member by position.
    pub fn member(&self, index: usize) -> Option<Arc<dyn Agent>> {
        self.members.get(index).cloned()
    }

    /// Member IDs in registration order.
    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|a| a.id().to_string()).collect()
    }

    /// Advance the round-robin cursor and return the selected position.
    pub fn next_index(&self) -> usize {
        if self.members.is_empty() {
            return 0;
        }
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.members.len()
    }

    /// Next member in round-robin order.
    pub fn next(&self) -> Option<Arc<dyn Agent>> {
        self.member(self.next_index())
    }

    fn with_member(&self, agent: Arc<dyn Agent>) -> Self {
        let mut members = self.members.clone();
        members.push(agent);
        Self {
            role: self.role.clone(),
            members,
            cursor: AtomicUsize::new(self.cursor.load(Ordering::Relaxed)),
        }
    }
}

impl std::fmt::Debug for AgentPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentPool")
            .field("role", &self.role)
            .field("members", &self.member_ids())
            .finish()
    }
}

/// Registry for managing agents by role.
pub struct AgentRegistry {
    pools: DashMap<String, Arc<AgentPool>>,
}

impl AgentRegistry {
    /// Create a new agent registry.
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Add an agent to the pool for `role`.
    ///
    /// Returns an error if an agent with the same ID already serves the role.
    pub fn register(&self, role: &str, agent: Arc<dyn Agent>) -> Result<(), RegistryError> {
        let mut entry = self
            .pools
            .entry(role.to_string())
            .or_insert_with(|| Arc::new(AgentPool::new(role, Vec::new())));

        if entry.member_ids().iter().any(|id| id == agent.id()) {
            return Err(RegistryError::AlreadyRegistered {
                role: role.to_string(),
                agent_id: agent.id().to_string(),
            });
        }

        let updated = entry.with_member(agent);
        *entry = Arc::new(updated);
        Ok(())
    }

    /// Register a whole pool for `role`, replacing any existing one.
    pub fn register_pool(&self, role: &str, agents: Vec<Arc<dyn Agent>>) {
        self.pools
            .insert(role.to_string(), Arc::new(AgentPool::new(role, agents)));
    }

    /// Remove every agent serving `role`.
    pub fn unregister(&self, role: &str) -> Result<(), RegistryError> {
        self.pools
            .remove(role)
            .ok_or_else(|| RegistryError::NotFound(role.to_string()))?;
        Ok(())
    }

    /// Get the pool for `role`.
    pub fn pool(&self, role: &str) -> Option<Arc<AgentPool>> {
        self.pools
            .get(role)
            .map(|pool| pool.clone())
            .filter(|pool| !pool.is_empty())
    }

    /// Pick an agent for `role` in round-robin order.
    pub fn resolve(&self, role: &str) -> Option<Arc<dyn Agent>> {
        self.pool(role).and_then(|pool| pool.next())
    }

    /// Check if any agent serves `role`.
    pub fn contains(&self, role: &str) -> bool {
        self.pool(role).is_some()
    }

    /// List all roles, sorted.
    pub fn roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.pools.iter().map(|p| p.key().clone()).collect();
        roles.sort();
        roles
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
