//! Agent registration for Taskloom.

use std::sync::Arc;

use tracing::info;

use taskloom_agent_static::{StaticKind, build_pool};
use taskloom_config::Config;
use taskloom_core::AgentRegistry;

/// Build the agent registry from the config's agent bindings.
pub(crate) fn register_agents(config: &Config) -> Result<Arc<AgentRegistry>, Box<dyn std::error::Error>> {
    let registry = Arc::new(AgentRegistry::new());

    for binding in config.agent_bindings() {
        let kind: StaticKind = binding.kind.parse()?;
        for agent in build_pool(&binding.role, kind, binding.pool_size, binding.threshold) {
            registry.register(&binding.role, agent)?;
        }
        info!(
            "Registered {} {} agent(s) for role '{}'",
            binding.pool_size.max(1),
            kind,
            binding.role
        );
    }

    Ok(registry)
}
