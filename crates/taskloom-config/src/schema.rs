//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

use taskloom_core::{EngineSettings, Workflow, WorkflowDefinition, WorkflowError};

/// Agent kinds the binary knows how to instantiate.
pub const AGENT_KINDS: [&str; 4] = ["writer", "reviewer", "refiner", "echo"];

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentBinding>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workflows: Vec<WorkflowDefinition>,
}

impl Config {
    /// The configured agent bindings, or one agent for each default role
    /// when none are configured.
    pub fn agent_bindings(&self) -> Vec<AgentBinding> {
        if !self.agents.is_empty() {
            return self.agents.clone();
        }
        [
            ("writer", "writer"),
            ("reviewer", "reviewer"),
            ("refiner", "refiner"),
            ("editor", "echo"),
        ]
        .into_iter()
        .map(|(role, kind)| AgentBinding::new(role, kind))
        .collect()
    }

    /// Inline workflow definition by name.
    pub fn workflow(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.workflows.iter().find(|w| w.name == name)
    }

    /// Build every inline workflow definition.
    pub fn build_workflows(&self) -> Result<Vec<Workflow>, WorkflowError> {
        self.workflows.iter().map(Workflow::from_definition).collect()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory of the daily-rolling log files. `~` is expanded.
    #[serde(default = "default_log_directory")]
    pub directory: String,

    /// Write log files in addition to the console.
    #[serde(default = "default_true")]
    pub file: bool,

    /// Number of daily log files to keep.
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: default_log_directory(),
            file: true,
            max_files: default_max_log_files(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    "~/.taskloom/logs".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_log_files() -> usize {
    14
}

/// Binds a role to a pool of built-in agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBinding {
    pub role: String,

    /// One of [`AGENT_KINDS`].
    pub kind: String,

    /// Number of agents in the role's pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Reviewer approval threshold on the 0-10 scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
}

impl AgentBinding {
    pub fn new(role: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            kind: kind.into(),
            pool_size: default_pool_size(),
            threshold: None,
        }
    }
}

fn default_pool_size() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskloom_core::{FailurePolicy, WorkflowPattern};

    #[test]
    fn test_config_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine, EngineSettings::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.directory, "~/.taskloom/logs");
        assert!(config.logging.file);
        assert!(config.agents.is_empty());
        assert!(config.workflows.is_empty());
    }

    #[test]
    fn test_default_agent_bindings() {
        let config = Config::default();
        let roles: Vec<String> = config.agent_bindings().into_iter().map(|b| b.role).collect();
        assert_eq!(roles, vec!["writer", "reviewer", "refiner", "editor"]);
    }

    #[test]
    fn test_configured_agent_bindings_replace_defaults() {
        let config: Config = toml::from_str(
            r#"
            [[agents]]
            role = "critic"
            kind = "reviewer"
            pool_size = 3
            threshold = 7
            "#,
        )
        .unwrap();
        let bindings = config.agent_bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].pool_size, 3);
        assert_eq!(bindings[0].threshold, Some(7));
    }

    #[test]
    fn test_engine_section() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            max_concurrency = 2
            failure_policy = "best_effort"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.max_concurrency, 2);
        assert_eq!(config.engine.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(config.engine.default_timeout_secs, 300);
    }

    #[test]
    fn test_inline_workflows() {
        let config: Config = toml::from_str(
            r#"
            [[workflows]]
            name = "article"
            pattern = "sequential"

            [[workflows.tasks]]
            id = "draft"
            role = "writer"
            instruction = "Write about {topic}"
            output_key = "draft"
            "#,
        )
        .unwrap();

        let def = config.workflow("article").unwrap();
        assert_eq!(def.pattern, WorkflowPattern::Sequential);
        let workflows = config.build_workflows().unwrap();
        assert_eq!(workflows[0].tasks().len(), 1);
        assert!(config.workflow("missing").is_none());
    }
}
