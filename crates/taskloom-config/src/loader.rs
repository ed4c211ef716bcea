//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use taskloom_core::WorkflowDefinition;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = Self::read(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load `path` if given, else `~/.taskloom/config.toml` when it exists,
    /// else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load a single workflow definition file.
    pub fn load_workflow(path: &Path) -> Result<WorkflowDefinition, ConfigError> {
        let content = Self::read(path)?;
        Self::load_workflow_str(&content)
    }

    /// Parse a single workflow definition.
    pub fn load_workflow_str(content: &str) -> Result<WorkflowDefinition, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let definition: WorkflowDefinition = toml::from_str(&expanded)?;
        Ok(definition)
    }

    /// Default configuration file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".taskloom").join("config.toml"))
    }

    /// Expand shell-style paths (e.g., `~/.taskloom`).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    fn read(path: &Path) -> Result<String, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        Ok(fs::read_to_string(path)?)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }
}
