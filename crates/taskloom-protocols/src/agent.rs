//! Agent protocol definitions.
//!
//! Agents are the external executors that perform the work named by a task's
//! role. The engine only ever calls [`Agent::execute`] and passes the payload
//! through untouched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::types::{Metadata, Parameters};

/// Core trait for agents.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent ID.
    fn id(&self) -> &str;

    /// Perform `role` with a fully substituted instruction.
    async fn execute(
        &self,
        role: &str,
        instruction: &str,
        parameters: &Parameters,
    ) -> Result<AgentOutput, AgentError>;
}

/// Result of a successful agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Opaque payload, written verbatim under the task's output key.
    pub payload: serde_json::Value,

    /// Metadata about the invocation (model, usage, etc.). Recorded in the
    /// run trace, never written to the variable store.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl AgentOutput {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl From<serde_json::Value> for AgentOutput {
    fn from(payload: serde_json::Value) -> Self {
        Self::new(payload)
    }
}
