//! Agent errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {0} ms")]
    Timeout(u64),

    #[error("Agent was aborted")]
    Aborted,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AgentError {
    /// Whether the failure was caused by the per-task deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
