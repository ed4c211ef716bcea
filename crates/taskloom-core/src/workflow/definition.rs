//! Declarative workflow definitions.
//!
//! These are the serializable form of a workflow, suitable for TOML or JSON
//! files. [`Workflow::from_definition`](super::Workflow::from_definition)
//! validates one and turns it into a runnable [`Workflow`](super::Workflow).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::task::Task;

use super::conditions::{BranchSpec, ConditionSpec};
use super::merge::MergeSpec;

/// Workflow execution pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPattern {
    Sequential,
    Parallel,
    Loop,
    Conditional,
}

impl WorkflowPattern {
    pub const ALL: [WorkflowPattern; 4] = [
        WorkflowPattern::Sequential,
        WorkflowPattern::Parallel,
        WorkflowPattern::Loop,
        WorkflowPattern::Conditional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Loop => "loop",
            Self::Conditional => "conditional",
        }
    }
}

impl fmt::Display for WorkflowPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification tag. Has no effect on execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowScope {
    /// Coordinates between agent tasks.
    #[default]
    Agent,
    /// Coordinates content generation.
    Content,
    /// Coordinates review and editing.
    Editorial,
}

/// What a PARALLEL fan-out does when one branch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Cancel pending siblings and report a partial failure.
    #[default]
    FailFast,
    /// Let every branch finish and report the mixed outcome.
    BestEffort,
}

/// Merge configuration of a PARALLEL workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDefinition {
    /// Key receiving the merged value.
    pub output_key: String,
    #[serde(flatten)]
    pub strategy: MergeSpec,
}

/// Handler registered for one branch key of a CONDITIONAL workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchDefinition {
    Task(Task),
    Workflow(Box<WorkflowDefinition>),
}

/// Serializable workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub pattern: WorkflowPattern,

    #[serde(default)]
    pub scope: WorkflowScope,

    /// Tasks of the pattern. For CONDITIONAL, tasks run before the branch
    /// is selected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// LOOP only. Defaults to 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// LOOP only. Defaults to a condition that is never met.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_condition: Option<ConditionSpec>,

    /// PARALLEL only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeDefinition>,

    /// CONDITIONAL only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_on: Option<BranchSpec>,

    /// CONDITIONAL only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branches: BTreeMap<String, BranchDefinition>,
}

impl WorkflowDefinition {
    /// Create an empty definition for `pattern`.
    pub fn new(name: impl Into<String>, pattern: WorkflowPattern) -> Self {
        Self {
            name: name.into(),
            description: None,
            pattern,
            scope: WorkflowScope::default(),
            tasks: Vec::new(),
            failure_policy: None,
            max_concurrency: None,
            max_iterations: None,
            exit_condition: None,
            merge: None,
            branch_on: None,
            branches: BTreeMap::new(),
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }
}
