//! Workflow executor core - drives tasks through resolution, substitution,
//! agent invocation and write-back.

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

mod parallel;
mod patterns;
mod report;
mod task_runner;

pub use report::{
    LoopOutcome, LoopTermination, RunFailure, RunReport, RunStatus, TaskOutcome, TraceEntry,
};

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use taskloom_protocols::Variables;

use crate::error::WorkflowError;
use crate::registry::AgentRegistry;
use crate::settings::EngineSettings;
use crate::store::VariableStore;
use crate::strategy::{Decision, DeclaredPatternStrategy, Hints, OrchestrationStrategy};
use crate::substitution;
use crate::task::Task;
use crate::workflow::{FailurePolicy, Workflow, WorkflowKind};

use task_runner::{Abort, Completion, Invocation, RunState};

/// Runs workflows against the agents of a registry.
pub struct WorkflowExecutor {
    registry: Arc<AgentRegistry>,
    strategy: Arc<dyn OrchestrationStrategy>,
    default_timeout: Duration,
    max_concurrency: usize,
    failure_policy: FailurePolicy,
    min_confidence: f64,
}

impl WorkflowExecutor {
    /// Create an executor with default settings and the declared-pattern
    /// strategy.
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self::from_config(registry, &EngineSettings::default())
    }

    /// Create an executor from the `[engine]` settings.
    pub fn from_config(registry: Arc<AgentRegistry>, settings: &EngineSettings) -> Self {
        Self {
            registry,
            strategy: Arc::new(DeclaredPatternStrategy),
            default_timeout: Duration::from_secs(settings.default_timeout_secs),
            max_concurrency: settings.max_concurrency.max(1),
            failure_policy: settings.failure_policy,
            min_confidence: settings.min_confidence,
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn OrchestrationStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Timeout for tasks that set none.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Fan-out bound for workflows that set none.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    /// PARALLEL failure policy for workflows that set none.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Run `workflow` to completion.
    pub async fn run(&self, workflow: &Workflow, initial: Variables) -> RunReport {
        self.run_with_cancel(workflow, initial, CancellationToken::new())
            .await
    }

    /// Run `workflow`, stopping pending agent calls when `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        workflow: &Workflow,
        initial: Variables,
        cancel: CancellationToken,
    ) -> RunReport {
        self.run_with_hints(workflow, initial, cancel, Hints::default())
            .await
    }

    /// Let the strategy pick a workflow from `catalog` for `task`, then run
    /// it with the task's parameters layered over `initial`.
    pub async fn dispatch(
        &self,
        task: &Task,
        catalog: &[Workflow],
        initial: Variables,
        hints: &Hints,
    ) -> Result<(Decision, RunReport), WorkflowError> {
        let decision = self
            .strategy
            .select_workflow(task, catalog, hints)
            .ok_or_else(|| {
                let wanted = hints
                    .pinned_pattern
                    .or(task.pattern)
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "any".to_string());
                WorkflowError::NoMatchingWorkflow(wanted)
            })?;

        if decision.confidence < self.min_confidence {
            warn!(
                "Low confidence ({:.2}) choosing {} workflow '{}' for task {}",
                decision.confidence, decision.pattern, decision.workflow, task.id
            );
        } else {
            info!(
                "Strategy {} chose {} workflow '{}' for task {} (confidence {:.2})",
                self.strategy.name(),
                decision.pattern,
                decision.workflow,
                task.id,
                decision.confidence
            );
        }

        let workflow = catalog
            .iter()
            .find(|w| w.name() == decision.workflow)
            .ok_or_else(|| WorkflowError::NoMatchingWorkflow(decision.pattern.to_string()))?;

        let mut variables = initial;
        for (key, value) in &task.parameters {
            variables.insert(key.clone(), value.clone());
        }

        let report = self
            .run_with_hints(workflow, variables, CancellationToken::new(), hints.clone())
            .await;
        Ok((decision, report))
    }

    async fn run_with_hints(
        &self,
        workflow: &Workflow,
        initial: Variables,
        cancel: CancellationToken,
        hints: Hints,
    ) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();
        let start = Instant::now();
        info!(
            "Starting {} workflow run: {} ({})",
            workflow.pattern(),
            workflow.name(),
            run_id
        );

        let mut state = RunState::new(initial, cancel, hints);
        let outcome = self.execute(workflow, &mut state).await;

        let (status, failure) = match outcome {
            Ok(()) => {
                info!("Workflow {} completed successfully", workflow.name());
                (RunStatus::Completed, None)
            }
            Err(abort) => {
                let status = if abort.completed.is_empty() {
                    RunStatus::Failed
                } else {
                    RunStatus::PartiallyFailed
                };
                error!("Workflow {} failed: {}", workflow.name(), abort.error);
                let failure = RunFailure {
                    task_id: abort.error.task_id().map(str::to_string),
                    kind: abort.error.kind(),
                    message: abort.error.to_string(),
                    snapshot: state.store.snapshot(),
                    completed: abort.completed,
                    incomplete: abort.incomplete,
                };
                (status, Some(failure))
            }
        };

        RunReport {
            run_id,
            workflow: workflow.name().to_string(),
            status,
            final_variables: state.store.snapshot(),
            trace: state.trace,
            failure,
            loop_outcome: state.loop_outcome,
            branch: state.branch,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Run one workflow against the run state (boxed for recursion into
    /// conditional sub-workflows).
    pub(crate) fn execute<'a>(
        &'a self,
        workflow: &'a Workflow,
        state: &'a mut RunState,
    ) -> BoxFuture<'a, Result<(), Abort>> {
        Box::pin(async move {
            match workflow.kind() {
                WorkflowKind::Sequential => self.run_sequence(workflow, state, None).await,
                WorkflowKind::Parallel { merge } => {
                    self.run_parallel(workflow, merge.as_ref(), state).await
                }
                WorkflowKind::Loop {
                    max_iterations,
                    exit_condition,
                } => {
                    self.run_loop(workflow, *max_iterations, exit_condition.as_ref(), state)
                        .await
                }
                WorkflowKind::Conditional { selector, branches } => {
                    self.run_conditional(workflow, selector.as_ref(), branches, state)
                        .await
                }
            }
        })
    }

    /// Render `task` against `store` and choose its agent.
    pub(crate) fn prepare(
        &self,
        task: &Task,
        store: &VariableStore,
        iteration: Option<u32>,
        hints: &Hints,
    ) -> Result<Invocation, WorkflowError> {
        let (instruction, parameters) = substitution::render(task, store)
            .map_err(|e| WorkflowError::from_substitution(&task.id, e))?;

        let pool = self
            .registry
            .pool(&task.role)
            .ok_or_else(|| WorkflowError::NoAgentForRole {
                task_id: task.id.clone(),
                role: task.role.clone(),
            })?;
        let index = self.strategy.select_member(task, &pool, hints) % pool.len();
        let agent = pool
            .member(index)
            .ok_or_else(|| WorkflowError::NoAgentForRole {
                task_id: task.id.clone(),
                role: task.role.clone(),
            })?;

        Ok(Invocation {
            task_id: task.id.clone(),
            role: task.role.clone(),
            output_key: task.output_key.clone(),
            iteration,
            agent,
            instruction,
            parameters,
            timeout: task.timeout().unwrap_or(self.default_timeout),
        })
    }

    /// Run a single task and write its result back to the store.
    pub(crate) async fn run_task(
        &self,
        task: &Task,
        state: &mut RunState,
        iteration: Option<u32>,
    ) -> Result<(), WorkflowError> {
        if state.cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        let completion = match self.prepare(task, &state.store, iteration, &state.hints) {
            Ok(invocation) => task_runner::invoke(invocation, state.cancel.clone()).await,
            Err(error) => Completion::rejected(task, iteration, error),
        };
        state.record(&completion);

        let output = completion.result?;
        state.write_back(&task.id, task.output_key.as_deref(), output);
        Ok(())
    }
}
