//! Run reports and the per-task trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use taskloom_protocols::{Metadata, Variables};

use crate::error::{ErrorKind, WorkflowError};

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// A PARALLEL fan-out finished with both completed and failed branches.
    PartiallyFailed,
    Failed,
}

/// Why a LOOP stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopTermination {
    ExitConditionMet,
    MaxIterationsReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopOutcome {
    /// Iterations that ran to completion.
    pub iterations: u32,
    pub termination: LoopTermination,
}

/// Result of one task invocation as recorded in the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_key: Option<String>,
        output: Value,
        #[serde(default, skip_serializing_if = "Metadata::is_empty")]
        metadata: Metadata,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
    /// Stopped before finishing by fail-fast or caller cancellation.
    Cancelled,
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub(crate) fn failed(error: &WorkflowError) -> Self {
        Self::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// One entry of the completion-ordered trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Position in completion order, starting at 0.
    pub sequence: usize,
    pub task_id: String,
    pub role: String,
    /// Agent that ran the task; absent when no agent was invoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// LOOP iteration, starting at 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    pub outcome: TaskOutcome,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Details of the failure that ended a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Originating task; absent for workflow-level failures such as an
    /// unrouted condition or cancellation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
    /// Variable store contents at the point of failure.
    pub snapshot: Variables,
    /// Tasks of the failing fan-out that finished.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed: Vec<String>,
    /// Tasks of the failing fan-out that failed, were cancelled, or never
    /// started.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incomplete: Vec<String>,
}

/// Outcome of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub workflow: String,
    pub status: RunStatus,
    pub final_variables: Variables,
    pub trace: Vec<TraceEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    /// Set when a LOOP ran; the innermost loop wins for nested workflows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_outcome: Option<LoopOutcome>,
    /// Branch key chosen by a CONDITIONAL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Value of `key` in the final variables.
    pub fn output(&self, key: &str) -> Option<&Value> {
        self.final_variables.get(key)
    }

    /// Task ids in completion order.
    pub fn task_order(&self) -> Vec<&str> {
        self.trace.iter().map(|e| e.task_id.as_str()).collect()
    }

    /// Trace entries of `task_id`, one per invocation.
    pub fn entries_for<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a TraceEntry> + 'a {
        self.trace.iter().filter(move |e| e.task_id == task_id)
    }
}
