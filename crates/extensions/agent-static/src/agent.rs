//! Static agent implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use taskloom_protocols::{Agent, AgentError, AgentOutput, Parameters};

use crate::kind::StaticKind;

const DEFAULT_THRESHOLD: u32 = 7;
const MAX_SCORE: u32 = 10;

/// Agent whose output is a pure function of its input.
///
/// Reviewers score `2..=5` for a first draft and two points more for every
/// revision the refiner has produced, so refinement loops converge.
#[derive(Debug, Clone)]
pub struct StaticAgent {
    id: String,
    kind: StaticKind,
    threshold: u32,
}

impl StaticAgent {
    pub fn new(id: impl Into<String>, kind: StaticKind) -> Self {
        Self {
            id: id.into(),
            kind,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Score at which a reviewer approves.
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn kind(&self) -> StaticKind {
        self.kind
    }

    fn review(&self, instruction: &str, parameters: &Parameters) -> Value {
        let bonus = latest_revision(parameters).saturating_mul(2);
        let score = base_score(instruction).saturating_add(bonus).min(MAX_SCORE);
        let approved = score >= self.threshold;
        let feedback = if approved {
            "Approved."
        } else {
            "Add concrete detail and tighten the structure."
        };
        json!({
            "score": score,
            "feedback": feedback,
            "approved": approved,
        })
    }
}

/// First-draft score in `2..=5`, derived from the instruction bytes.
fn base_score(instruction: &str) -> u32 {
    instruction
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_add(u32::from(b)))
        % 4
        + 2
}

/// Highest `revision` found in the parameters, either directly or inside an
/// object value such as a previous refiner output.
fn latest_revision(parameters: &Parameters) -> u32 {
    parameters
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Number(_) if key == "revision" => value.as_u64(),
            Value::Object(map) => map.get("revision").and_then(Value::as_u64),
            _ => None,
        })
        .max()
        .map(|r| u32::try_from(r).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

#[async_trait]
impl Agent for StaticAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        role: &str,
        instruction: &str,
        parameters: &Parameters,
    ) -> Result<AgentOutput, AgentError> {
        if instruction.trim().is_empty() {
            return Err(AgentError::InvalidInput("empty instruction".to_string()));
        }
        debug!("Static {} agent {} handling role {}", self.kind, self.id, role);

        let payload = match self.kind {
            StaticKind::Writer => json!({ "content": instruction }),
            StaticKind::Reviewer => self.review(instruction, parameters),
            StaticKind::Refiner => json!({
                "content": instruction,
                "revision": latest_revision(parameters).saturating_add(1),
            }),
            StaticKind::Echo => json!({
                "role": role,
                "instruction": instruction,
                "parameters": parameters,
            }),
        };

        Ok(AgentOutput::new(payload)
            .with_metadata("agent", json!(self.id))
            .with_metadata("kind", json!(self.kind.as_str())))
    }
}

/// Agents `{role}-1` to `{role}-{size}` of one kind, ready for a role's pool.
pub fn build_pool(
    role: &str,
    kind: StaticKind,
    size: usize,
    threshold: Option<u32>,
) -> Vec<Arc<dyn Agent>> {
    (1..=size.max(1))
        .map(|i| {
            let agent = StaticAgent::new(format!("{}-{}", role, i), kind)
                .with_threshold(threshold.unwrap_or(DEFAULT_THRESHOLD));
            Arc::new(agent) as Arc<dyn Agent>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(agent: &StaticAgent, instruction: &str, parameters: Parameters) -> Value {
        agent
            .execute("role", instruction, &parameters)
            .await
            .unwrap()
            .payload
    }

    #[tokio::test]
    async fn test_writer_returns_instruction() {
        let agent = StaticAgent::new("w", StaticKind::Writer);
        let payload = run(&agent, "Write about owls", Parameters::new()).await;
        assert_eq!(payload, json!({"content": "Write about owls"}));
    }

    #[tokio::test]
    async fn test_reviewer_is_deterministic() {
        let agent = StaticAgent::new("r", StaticKind::Reviewer);
        let first = run(&agent, "Review this draft", Parameters::new()).await;
        let second = run(&agent, "Review this draft", Parameters::new()).await;
        assert_eq!(first, second);

        let score = first["score"].as_u64().unwrap();
        assert!((2..=5).contains(&score));
        assert_eq!(first["approved"], json!(false));
    }

    #[tokio::test]
    async fn test_reviewer_score_grows_with_revisions() {
        let agent = StaticAgent::new("r", StaticKind::Reviewer).with_threshold(8);
        let mut parameters = Parameters::new();
        parameters.insert("draft".into(), json!({"content": "x", "revision": 3}));

        let review = run(&agent, "Review x", parameters).await;
        assert!(review["score"].as_u64().unwrap() >= 8);
        assert_eq!(review["approved"], json!(true));
        assert_eq!(review["feedback"], json!("Approved."));
    }

    #[test]
    fn test_base_score_handles_long_instructions() {
        // 386 per "ÿ" (0xC3 0xBF); the byte sum exceeds u32::MAX.
        let instruction = "ÿ".repeat(12_000_000);
        assert_eq!(base_score(&instruction), 2);
        assert_eq!(base_score("ab"), (97 + 98) % 4 + 2);
    }

    #[tokio::test]
    async fn test_reviewer_caps_huge_revision() {
        let agent = StaticAgent::new("r", StaticKind::Reviewer);
        let mut parameters = Parameters::new();
        parameters.insert("revision".into(), json!(u64::MAX));

        let review = run(&agent, "Review x", parameters).await;
        assert_eq!(review["score"], json!(MAX_SCORE));
        assert_eq!(review["approved"], json!(true));
    }

    #[tokio::test]
    async fn test_refiner_counts_revisions() {
        let agent = StaticAgent::new("f", StaticKind::Refiner);
        let first = run(&agent, "Refine it", Parameters::new()).await;
        assert_eq!(first["revision"], json!(1));

        let mut parameters = Parameters::new();
        parameters.insert("draft".into(), first);
        let second = run(&agent, "Refine it again", parameters).await;
        assert_eq!(second["revision"], json!(2));
        assert_eq!(second["content"], json!("Refine it again"));
    }

    #[tokio::test]
    async fn test_echo_reflects_input() {
        let agent = StaticAgent::new("e", StaticKind::Echo);
        let mut parameters = Parameters::new();
        parameters.insert("topic".into(), json!("owls"));
        let payload = run(&agent, "Say {topic}", parameters).await;
        assert_eq!(payload["role"], json!("role"));
        assert_eq!(payload["parameters"]["topic"], json!("owls"));
    }

    #[tokio::test]
    async fn test_empty_instruction_is_rejected() {
        let agent = StaticAgent::new("w", StaticKind::Writer);
        let result = agent.execute("writer", "  ", &Parameters::new()).await;
        assert!(matches!(result, Err(AgentError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_metadata_names_agent() {
        let agent = StaticAgent::new("w-1", StaticKind::Writer);
        let output = agent.execute("writer", "Go", &Parameters::new()).await.unwrap();
        assert_eq!(output.metadata.get("agent"), Some(&json!("w-1")));
        assert_eq!(output.metadata.get("kind"), Some(&json!("writer")));
    }

    #[test]
    fn test_build_pool() {
        let pool = build_pool("reviewer", StaticKind::Reviewer, 3, Some(9));
        let ids: Vec<&str> = pool.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["reviewer-1", "reviewer-2", "reviewer-3"]);
        assert_eq!(build_pool("writer", StaticKind::Writer, 0, None).len(), 1);
    }
}
