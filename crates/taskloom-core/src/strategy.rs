//! Orchestration strategies: which workflow runs a task, which pool member
//! runs a role.
//!
//! Strategies are advisory. The engine runs correctly with
//! [`DeclaredPatternStrategy`], which only honours explicit pins.

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::registry::AgentPool;
use crate::task::Task;
use crate::workflow::{Workflow, WorkflowPattern};

/// Caller-supplied hints for a decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hints {
    /// Pattern the caller insists on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_pattern: Option<WorkflowPattern>,

    /// Workflow the caller insists on, by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_workflow: Option<String>,

    /// Pool position to use when a role has several agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_member: Option<usize>,

    /// Free-form signals such as `{"iterative": true}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub signals: BTreeMap<String, Value>,
}

impl Hints {
    pub fn pin(pattern: WorkflowPattern) -> Self {
        Self {
            pinned_pattern: Some(pattern),
            ..Self::default()
        }
    }

    pub fn with_signal(mut self, key: impl Into<String>, value: Value) -> Self {
        self.signals.insert(key.into(), value);
        self
    }
}

/// A strategy's choice for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub workflow: String,
    pub pattern: WorkflowPattern,
    pub agent_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<usize>,
    /// In `0.0..=1.0`.
    pub confidence: f64,
}

/// Policy for choosing workflows and pool members.
pub trait OrchestrationStrategy: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &str;

    /// Pick a workflow from `available` for `task`. `None` when nothing fits.
    fn select_workflow(&self, task: &Task, available: &[Workflow], hints: &Hints) -> Option<Decision>;

    /// Pick the pool position that runs `task`. Out-of-range values wrap.
    fn select_member(&self, task: &Task, pool: &AgentPool, hints: &Hints) -> usize;
}

/// Pattern explicitly pinned by the hints, then by the task.
fn pinned(task: &Task, hints: &Hints) -> Option<WorkflowPattern> {
    hints.pinned_pattern.or(task.pattern)
}

fn preferred<'a>(available: &'a [Workflow], hints: &Hints) -> Option<&'a Workflow> {
    let name = hints.preferred_workflow.as_deref()?;
    available.iter().find(|w| w.name() == name)
}

fn decide(task: &Task, workflow: &Workflow, hints: &Hints, confidence: f64) -> Decision {
    Decision {
        workflow: workflow.name().to_string(),
        pattern: workflow.pattern(),
        agent_role: task.role.clone(),
        member: hints.preferred_member,
        confidence,
    }
}

/// Always runs the declared pattern: hint pin, then task pin, then
/// SEQUENTIAL. Members rotate round-robin.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredPatternStrategy;

impl OrchestrationStrategy for DeclaredPatternStrategy {
    fn name(&self) -> &str {
        "declared"
    }

    fn select_workflow(&self, task: &Task, available: &[Workflow], hints: &Hints) -> Option<Decision> {
        if let Some(workflow) = preferred(available, hints) {
            return Some(decide(task, workflow, hints, 1.0));
        }

        let pin = pinned(task, hints);
        let pattern = pin.unwrap_or(WorkflowPattern::Sequential);
        let confidence = if pin.is_some() { 1.0 } else { 0.5 };
        available
            .iter()
            .find(|w| w.pattern() == pattern)
            .map(|w| decide(task, w, hints, confidence))
    }

    fn select_member(&self, _task: &Task, pool: &AgentPool, _hints: &Hints) -> usize {
        pool.next_index()
    }
}

const LOOP_WORDS: &[&str] = &[
    "refine", "iterat", "improve", "revise", "polish", "until", "quality", "threshold",
];
const LOOP_KEYS: &[&str] = &["max_iterations", "quality_threshold", "min_score", "iterative"];

const PARALLEL_WORDS: &[&str] = &[
    "variant", "drafts", "alternative", "options", "multiple", "compare", "brainstorm",
];
const PARALLEL_KEYS: &[&str] = &["variants", "parallel"];

const CONDITIONAL_WORDS: &[&str] = &[
    "route", "depending", "classify", "based on", "either", "type of", "decide",
];
const CONDITIONAL_KEYS: &[&str] = &["content_type", "branch", "route", "category"];

const SEQUENTIAL_WORDS: &[&str] = &["then", "pipeline", "step", "after", "finally", "first"];

const KEYWORD_WEIGHT: f64 = 1.0;
const KEY_WEIGHT: f64 = 2.0;

/// Scores patterns from keywords and parameters of the task and hints.
///
/// Explicit pins still win with confidence 1.0. Otherwise the confidence is
/// the winning pattern's share of the total score.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStrategy;

impl HeuristicStrategy {
    /// Score of every pattern, in [`WorkflowPattern::ALL`] order.
    pub fn scores(&self, task: &Task, hints: &Hints) -> [(WorkflowPattern, f64); 4] {
        let text = format!("{} {}", task.role, task.instruction_template).to_lowercase();
        let values: BTreeMap<&str, &Value> = task
            .parameters
            .iter()
            .chain(hints.signals.iter())
            .map(|(k, v)| (k.as_str(), v))
            .collect();

        let keyword_score = |words: &[&str]| {
            words.iter().filter(|w| text.contains(**w)).count() as f64 * KEYWORD_WEIGHT
        };
        let key_score = |keys: &[&str]| {
            keys.iter()
                .filter(|k| values.get(*k).is_some_and(|v| signals_presence(v)))
                .count() as f64
                * KEY_WEIGHT
        };

        let mut parallel = keyword_score(PARALLEL_WORDS) + key_score(PARALLEL_KEYS);
        if values
            .get("num_variants")
            .and_then(|v| v.as_u64())
            .is_some_and(|n| n > 1)
        {
            parallel += KEY_WEIGHT;
        }

        let mut sequential = 1.0 + keyword_score(SEQUENTIAL_WORDS);
        if !task.depends_on.is_empty() {
            sequential += KEYWORD_WEIGHT;
        }

        [
            (WorkflowPattern::Sequential, sequential),
            (WorkflowPattern::Parallel, 0.5 + parallel),
            (WorkflowPattern::Loop, 0.5 + keyword_score(LOOP_WORDS) + key_score(LOOP_KEYS)),
            (
                WorkflowPattern::Conditional,
                0.5 + keyword_score(CONDITIONAL_WORDS) + key_score(CONDITIONAL_KEYS),
            ),
        ]
    }
}

/// Whether a parameter value counts as a signal.
fn signals_presence(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f > 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

impl OrchestrationStrategy for HeuristicStrategy {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn select_workflow(&self, task: &Task, available: &[Workflow], hints: &Hints) -> Option<Decision> {
        if let Some(workflow) = preferred(available, hints) {
            return Some(decide(task, workflow, hints, 1.0));
        }
        if let Some(pattern) = pinned(task, hints) {
            return available
                .iter()
                .find(|w| w.pattern() == pattern)
                .map(|w| decide(task, w, hints, 1.0));
        }

        let scores = self.scores(task, hints);
        let total: f64 = scores.iter().map(|(_, s)| s).sum();

        // Stable sort keeps ALL order for equal scores.
        let mut ranked = scores.to_vec();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        debug!("Heuristic scores for task {}: {:?}", task.id, ranked);

        ranked.into_iter().find_map(|(pattern, score)| {
            available
                .iter()
                .find(|w| w.pattern() == pattern)
                .map(|w| decide(task, w, hints, score / total))
        })
    }

    fn select_member(&self, _task: &Task, pool: &AgentPool, hints: &Hints) -> usize {
        match hints.preferred_member {
            Some(index) if index < pool.len() => index,
            _ => pool.next_index(),
        }
    }
}
