//! Configuration errors.

use thiserror::Error;

use taskloom_core::WorkflowError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid workflow definition: {0}")]
    Workflow(#[from] WorkflowError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_workflow_file() {
        let err = ConfigError::NotFound("workflows/refine.toml".to_string());
        assert_eq!(err.to_string(), "Config file not found: workflows/refine.toml");
    }

    #[test]
    fn test_unset_placeholder_variable() {
        let err = ConfigError::EnvVarNotSet("TASKLOOM_TOPIC".to_string());
        assert!(err.to_string().ends_with("TASKLOOM_TOPIC"));
    }

    #[test]
    fn test_toml_error_from() {
        let parse = toml::from_str::<toml::Value>("pattern = ").unwrap_err();
        let err = ConfigError::from(parse);
        assert!(matches!(err, ConfigError::TomlParse(_)));
        assert!(err.to_string().starts_with("TOML parse error"));
    }

    #[test]
    fn test_workflow_error_from() {
        let err = ConfigError::from(WorkflowError::DuplicateTask("draft".to_string()));
        assert!(err.to_string().starts_with("Invalid workflow definition"));
        assert!(err.to_string().contains("draft"));
        assert!(matches!(err, ConfigError::Workflow(_)));
    }
}
