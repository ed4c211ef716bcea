//! Test doubles for the engine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use taskloom_protocols::{Agent, AgentError, AgentOutput, Parameters};

/// One recorded invocation of a [`MockAgent`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    /// Zero-based position of the call in this agent's history.
    pub index: usize,
    pub role: String,
    pub instruction: String,
    pub parameters: Parameters,
}

type Handler = Arc<dyn Fn(&MockCall) -> Result<Value, AgentError> + Send + Sync>;

/// Agent that returns pre-configured responses and records every call.
///
/// Without a configured response it answers with the role and rendered
/// instruction, which is enough to follow data through a workflow.
#[derive(Clone)]
pub struct MockAgent {
    id: String,
    handler: Option<Handler>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockAgent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handler: None,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with `payload`.
    pub fn respond_with(self, payload: Value) -> Self {
        self.respond_with_fn(move |_| Ok(payload.clone()))
    }

    /// Compute each answer from the call.
    pub fn respond_with_fn<F>(mut self, handler: F) -> Self
    where
        F: Fn(&MockCall) -> Result<Value, AgentError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Fail every call with `error`.
    pub fn fail_with(self, error: AgentError) -> Self {
        self.respond_with_fn(move |_| Err(error.clone()))
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Instructions received so far, in call order.
    pub fn instructions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.instruction).collect()
    }
}

impl std::fmt::Debug for MockAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAgent")
            .field("id", &self.id)
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        role: &str,
        instruction: &str,
        parameters: &Parameters,
    ) -> Result<AgentOutput, AgentError> {
        let call = {
            let mut calls = self
                .calls
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let call = MockCall {
                index: calls.len(),
                role: role.to_string(),
                instruction: instruction.to_string(),
                parameters: parameters.clone(),
            };
            calls.push(call.clone());
            call
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let payload = match &self.handler {
            Some(handler) => handler(&call)?,
            None => json!({
                "agent": self.id,
                "role": role,
                "instruction": instruction,
            }),
        };
        Ok(AgentOutput::new(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_agent_default_response() {
        let agent = MockAgent::new("m1");
        let output = agent
            .execute("writer", "Write it", &Parameters::new())
            .await
            .unwrap();
        assert_eq!(output.payload["instruction"], "Write it");
        assert_eq!(agent.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_agent_scripted_by_call_index() {
        let agent = MockAgent::new("m1").respond_with_fn(|call| Ok(json!(call.index * 2)));
        let params = Parameters::new();
        agent.execute("r", "a", &params).await.unwrap();
        let second = agent.execute("r", "b", &params).await.unwrap();
        assert_eq!(second.payload, json!(2));
        assert_eq!(agent.instructions(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_mock_agent_failure_is_recorded() {
        let agent = MockAgent::new("m1").fail_with(AgentError::ExecutionFailed("boom".into()));
        let result = agent.execute("r", "x", &Parameters::new()).await;
        assert!(result.is_err());
        assert_eq!(agent.call_count(), 1);
    }
}
