//! Configuration validation.

use std::collections::HashSet;

use taskloom_core::{Workflow, WorkflowDefinition};

use crate::error::ConfigError;
use crate::schema::{AGENT_KINDS, Config};

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];
const HIGH_MAX_ITERATIONS: u32 = 100;
const HIGH_CONCURRENCY: usize = 64;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, including its inline workflows.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_engine(config, &mut result);
        Self::validate_logging(config, &mut result);
        Self::validate_agents(config, &mut result);

        let mut names = HashSet::new();
        for (index, definition) in config.workflows.iter().enumerate() {
            let path = format!("workflows[{}]", index);
            if !names.insert(definition.name.as_str()) {
                result.add_error(ValidationError::new(
                    &path,
                    format!("Duplicate workflow name '{}'", definition.name),
                ));
            }
            Self::check_workflow(config, definition, &path, &mut result);
        }

        Ok(result)
    }

    /// Validate a standalone workflow definition against `config`.
    pub fn validate_workflow(
        config: &Config,
        definition: &WorkflowDefinition,
    ) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();
        Self::check_workflow(config, definition, &definition.name, &mut result);
        Ok(result)
    }

    fn validate_engine(config: &Config, result: &mut ValidationResult) {
        let engine = &config.engine;
        if engine.default_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "engine.default_timeout_secs",
                "default_timeout_secs must be greater than 0",
            ));
        }

        if engine.max_concurrency == 0 {
            result.add_error(ValidationError::new(
                "engine.max_concurrency",
                "max_concurrency must be greater than 0",
            ));
        } else if engine.max_concurrency > HIGH_CONCURRENCY {
            result.add_warning(ValidationWarning::new(
                "engine.max_concurrency",
                format!(
                    "max_concurrency is very high (>{}), agents may be overloaded",
                    HIGH_CONCURRENCY
                ),
            ));
        }

        if !(0.0..=1.0).contains(&engine.min_confidence) {
            result.add_error(ValidationError::new(
                "engine.min_confidence",
                "min_confidence must be between 0.0 and 1.0",
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        let level = config.logging.level.to_lowercase();
        // Full filter directives such as "taskloom_core=debug" are passed through.
        if !level.contains('=') && !LOG_LEVELS.contains(&level.as_str()) {
            result.add_warning(ValidationWarning::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', valid values: {:?}",
                    config.logging.level, LOG_LEVELS
                ),
            ));
        }

        if config.logging.file && config.logging.directory.is_empty() {
            result.add_error(ValidationError::new(
                "logging.directory",
                "Log directory cannot be empty when file logging is enabled",
            ));
        }
    }

    fn validate_agents(config: &Config, result: &mut ValidationResult) {
        let mut roles = HashSet::new();
        for (index, agent) in config.agents.iter().enumerate() {
            let path = format!("agents[{}]", index);

            if agent.role.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.role", path),
                    "Agent role cannot be empty",
                ));
            } else if !roles.insert(agent.role.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.role", path),
                    format!(
                        "Role '{}' is bound more than once; use pool_size for several agents",
                        agent.role
                    ),
                ));
            }

            if !AGENT_KINDS.contains(&agent.kind.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.kind", path),
                    format!(
                        "Unknown agent kind '{}', valid values: {:?}",
                        agent.kind, AGENT_KINDS
                    ),
                ));
            }

            if agent.pool_size == 0 {
                result.add_error(ValidationError::new(
                    format!("{}.pool_size", path),
                    "pool_size must be greater than 0",
                ));
            }

            if agent.threshold.is_some_and(|t| t > 10) {
                result.add_warning(ValidationWarning::new(
                    format!("{}.threshold", path),
                    "threshold is above the 0-10 review scale and can never be reached",
                ));
            }
        }
    }

    fn check_workflow(
        config: &Config,
        definition: &WorkflowDefinition,
        path: &str,
        result: &mut ValidationResult,
    ) {
        if definition
            .max_iterations
            .is_some_and(|n| n > HIGH_MAX_ITERATIONS)
        {
            result.add_warning(ValidationWarning::new(
                format!("{}.max_iterations", path),
                format!(
                    "max_iterations is very high (>{}), this may lead to long-running loops",
                    HIGH_MAX_ITERATIONS
                ),
            ));
        }

        if definition
            .max_concurrency
            .is_some_and(|n| n > HIGH_CONCURRENCY)
        {
            result.add_warning(ValidationWarning::new(
                format!("{}.max_concurrency", path),
                format!("max_concurrency is very high (>{})", HIGH_CONCURRENCY),
            ));
        }

        let workflow = match Workflow::from_definition(definition) {
            Ok(workflow) => workflow,
            Err(e) => {
                result.add_error(ValidationError::new(path, e.to_string()));
                return;
            }
        };

        let bound: HashSet<String> = config
            .agent_bindings()
            .into_iter()
            .map(|b| b.role)
            .collect();
        for role in workflow.roles() {
            if !bound.contains(&role) {
                result.add_warning(ValidationWarning::new(
                    path,
                    format!("No agent is bound to role '{}'", role),
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
