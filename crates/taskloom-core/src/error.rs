//! Engine errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use taskloom_protocols::AgentError;

/// Errors raised while resolving `{placeholder}` references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstitutionError {
    #[error("Missing variable: {0}")]
    MissingVariable(String),

    #[error("Unterminated placeholder at byte {0}")]
    UnterminatedPlaceholder(usize),

    #[error("Invalid placeholder '{{{content}}}' at byte {position}")]
    InvalidPlaceholder { position: usize, content: String },
}

impl SubstitutionError {
    /// Byte offset of the offending `{`, for malformed templates.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::MissingVariable(_) => None,
            Self::UnterminatedPlaceholder(position) | Self::InvalidPlaceholder { position, .. } => {
                Some(*position)
            }
        }
    }
}

/// Agent registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Agent '{agent_id}' is already registered for role '{role}'")]
    AlreadyRegistered { role: String, agent_id: String },

    #[error("No agents registered for role: {0}")]
    NotFound(String),
}

/// Engine error type.
///
/// Graph errors (`CyclicDependency`, `WriteConflict`, `UnknownDependency`,
/// `DuplicateTask`, `InvalidDefinition`) are raised while building a
/// [`Workflow`](crate::Workflow) and never surface mid-run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cyclic dependency between tasks: {}", task_ids.join(", "))]
    CyclicDependency { task_ids: Vec<String> },

    #[error("Write conflict on output key '{key}' between tasks: {}", task_ids.join(", "))]
    WriteConflict { key: String, task_ids: Vec<String> },

    #[error("Task '{task_id}' depends on unknown task '{dependency}'")]
    UnknownDependency { task_id: String, dependency: String },

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("Invalid workflow '{workflow}': {message}")]
    InvalidDefinition { workflow: String, message: String },

    #[error("Task '{task_id}' references missing variable '{key}'")]
    MissingVariable { task_id: String, key: String },

    #[error("Task '{task_id}' has a malformed instruction template: {source}")]
    MalformedTemplate {
        task_id: String,
        #[source]
        source: SubstitutionError,
    },

    #[error("No branch registered for condition key '{0}'")]
    UnroutedCondition(String),

    #[error("Task '{task_id}' failed: {source}")]
    TaskExecutionFailure {
        task_id: String,
        #[source]
        source: AgentError,
    },

    #[error("No agent registered for role '{role}' (task '{task_id}')")]
    NoAgentForRole { task_id: String, role: String },

    #[error("Merge of parallel outputs into '{key}' failed: {message}")]
    MergeFailed { key: String, message: String },

    #[error("No available workflow matches pattern {0}")]
    NoMatchingWorkflow(String),

    #[error("Run was cancelled")]
    Cancelled,
}

impl WorkflowError {
    pub(crate) fn invalid(workflow: &str, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            workflow: workflow.to_string(),
            message: message.into(),
        }
    }

    /// Attach a task id to a substitution failure.
    pub(crate) fn from_substitution(task_id: &str, err: SubstitutionError) -> Self {
        match err {
            SubstitutionError::MissingVariable(key) => Self::MissingVariable {
                task_id: task_id.to_string(),
                key,
            },
            other => Self::MalformedTemplate {
                task_id: task_id.to_string(),
                source: other,
            },
        }
    }

    /// Classification used in traces and reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            Self::WriteConflict { .. } => ErrorKind::WriteConflict,
            Self::UnknownDependency { .. } | Self::DuplicateTask(_) | Self::InvalidDefinition { .. } => {
                ErrorKind::InvalidDefinition
            }
            Self::MissingVariable { .. } | Self::MalformedTemplate { .. } => ErrorKind::MissingVariable,
            Self::UnroutedCondition(_) => ErrorKind::UnroutedCondition,
            Self::TaskExecutionFailure { .. } => ErrorKind::TaskExecutionFailure,
            Self::NoAgentForRole { .. } => ErrorKind::NoAgentForRole,
            Self::MergeFailed { .. } => ErrorKind::MergeFailed,
            Self::NoMatchingWorkflow(_) => ErrorKind::NoMatchingWorkflow,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The task the error originated from, when there is one.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::UnknownDependency { task_id, .. }
            | Self::MissingVariable { task_id, .. }
            | Self::MalformedTemplate { task_id, .. }
            | Self::TaskExecutionFailure { task_id, .. }
            | Self::NoAgentForRole { task_id, .. } => Some(task_id),
            Self::DuplicateTask(id) => Some(id),
            _ => None,
        }
    }
}

/// Serializable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CyclicDependency,
    WriteConflict,
    InvalidDefinition,
    MissingVariable,
    UnroutedCondition,
    TaskExecutionFailure,
    NoAgentForRole,
    MergeFailed,
    NoMatchingWorkflow,
    Cancelled,
}
