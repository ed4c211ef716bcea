//! Workflow definitions, builders and the pattern-specific seams.

mod builder;
mod conditions;
mod definition;
mod merge;

pub use builder::{Branch, DEFAULT_MAX_ITERATIONS, MergeStrategy, Workflow, WorkflowBuilder, WorkflowKind};
pub use conditions::{
    BranchRule, BranchSelector, BranchSpec, ConditionSpec, ExitCondition, evaluate_expression,
    is_truthy,
};
pub use definition::{
    BranchDefinition, FailurePolicy, MergeDefinition, WorkflowDefinition, WorkflowPattern,
    WorkflowScope,
};
pub use merge::{BranchOutput, MergeSpec, OutputMerger};
