//! Sequential, loop and conditional execution.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::error::WorkflowError;
use crate::workflow::{Branch, BranchSelector, ExitCondition, Workflow};

use super::WorkflowExecutor;
use super::report::{LoopOutcome, LoopTermination};
use super::task_runner::{Abort, RunState};

impl WorkflowExecutor {
    /// Run the workflow's tasks one at a time in schedule order. The first
    /// failure aborts the rest.
    pub(crate) async fn run_sequence(
        &self,
        workflow: &Workflow,
        state: &mut RunState,
        iteration: Option<u32>,
    ) -> Result<(), Abort> {
        for task_id in &workflow.schedule().order {
            let Some(task) = workflow.task(task_id) else {
                continue;
            };
            self.run_task(task, state, iteration).await?;
        }
        Ok(())
    }

    /// Repeat the task sequence until the exit condition holds or the cap
    /// is reached. Hitting the cap is a normal outcome.
    pub(crate) async fn run_loop(
        &self,
        workflow: &Workflow,
        max_iterations: u32,
        exit_condition: &dyn ExitCondition,
        state: &mut RunState,
    ) -> Result<(), Abort> {
        for iteration in 1..=max_iterations {
            debug!(
                "Loop {} iteration {}/{}",
                workflow.name(),
                iteration,
                max_iterations
            );
            self.run_sequence(workflow, state, Some(iteration)).await?;

            if exit_condition.is_met(&state.store, iteration) {
                info!(
                    "Loop {} met its exit condition after {} iterations",
                    workflow.name(),
                    iteration
                );
                state.loop_outcome = Some(LoopOutcome {
                    iterations: iteration,
                    termination: LoopTermination::ExitConditionMet,
                });
                return Ok(());
            }
        }

        warn!(
            "Loop {} reached max iterations ({}) without meeting its exit condition",
            workflow.name(),
            max_iterations
        );
        state.loop_outcome = Some(LoopOutcome {
            iterations: max_iterations,
            termination: LoopTermination::MaxIterationsReached,
        });
        Ok(())
    }

    /// Run the preamble, evaluate the selector once, then run only the
    /// selected branch.
    pub(crate) async fn run_conditional(
        &self,
        workflow: &Workflow,
        selector: &dyn BranchSelector,
        branches: &BTreeMap<String, Branch>,
        state: &mut RunState,
    ) -> Result<(), Abort> {
        self.run_sequence(workflow, state, None).await?;

        let key = selector
            .select(&state.store)
            .ok_or_else(|| WorkflowError::UnroutedCondition("<none>".to_string()))?;
        let branch = branches
            .get(&key)
            .ok_or_else(|| WorkflowError::UnroutedCondition(key.clone()))?;

        info!("Workflow {} routed to branch '{}'", workflow.name(), key);
        state.branch = Some(key);

        match branch {
            Branch::Task(task) => {
                self.run_task(task, state, None).await?;
                Ok(())
            }
            Branch::Workflow(sub) => self.execute(sub, state).await,
        }
    }
}
