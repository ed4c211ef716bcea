//! Engine settings.

use serde::{Deserialize, Serialize};

use crate::workflow::FailurePolicy;

/// Executor defaults, loaded from the `[engine]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Per-task timeout for tasks that set none.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Bound on concurrently running PARALLEL branches.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// PARALLEL failure policy for workflows that set none.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Strategy decisions below this confidence are logged as warnings.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            failure_policy: FailurePolicy::default(),
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_concurrency() -> usize {
    8
}

fn default_min_confidence() -> f64 {
    0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_settings_defaults() {
        let settings: EngineSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.default_timeout_secs, 300);
        assert_eq!(settings.max_concurrency, 8);
        assert_eq!(settings.failure_policy, FailurePolicy::FailFast);
    }
}
