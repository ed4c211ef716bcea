//! # Taskloom Core
//!
//! Workflow orchestration engine: runs tasks through registered agents in
//! sequential, parallel, loop and conditional patterns.
//!
//! ## Components
//!
//! - [`VariableStore`] - Shared key/value state of one run
//! - [`DependencyResolver`] - Orders tasks and groups them into waves
//! - [`AgentRegistry`] - Maps roles to pools of agents
//! - [`Workflow`] - A validated, executable workflow
//! - [`WorkflowExecutor`] - Drives a workflow and produces a [`RunReport`]
//! - [`OrchestrationStrategy`] - Chooses workflows and pool members

pub mod error;
pub mod executor;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod strategy;
pub mod substitution;
pub mod task;
pub mod workflow;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{ErrorKind, RegistryError, SubstitutionError, WorkflowError};
pub use executor::{
    LoopOutcome, LoopTermination, RunFailure, RunReport, RunStatus, TaskOutcome, TraceEntry,
    WorkflowExecutor,
};
pub use registry::{AgentPool, AgentRegistry};
pub use resolver::{DependencyResolver, Schedule};
pub use settings::EngineSettings;
pub use store::VariableStore;
pub use strategy::{
    Decision, DeclaredPatternStrategy, HeuristicStrategy, Hints, OrchestrationStrategy,
};
pub use task::Task;
pub use workflow::{
    Branch, BranchSpec, ConditionSpec, FailurePolicy, MergeSpec, Workflow, WorkflowBuilder,
    WorkflowDefinition, WorkflowKind, WorkflowPattern, WorkflowScope,
};
