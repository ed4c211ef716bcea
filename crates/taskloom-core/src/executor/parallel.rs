//! PARALLEL fan-out.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use taskloom_protocols::{AgentError, AgentOutput};

use crate::error::WorkflowError;
use crate::store::VariableStore;
use crate::task::Task;
use crate::workflow::{BranchOutput, FailurePolicy, MergeStrategy, Workflow};

use super::WorkflowExecutor;
use super::task_runner::{self, Abort, Completion, RunState};

/// Bookkeeping for one fan-out.
#[derive(Default)]
struct FanOut {
    completed: Vec<String>,
    failed: Vec<(String, WorkflowError)>,
    /// Cancelled, skipped, or never started.
    not_run: Vec<String>,
    outputs: Vec<BranchOutput>,
}

impl FanOut {
    fn fail(&mut self, task: &Task, error: WorkflowError) {
        self.failed.push((task.id.clone(), error));
    }

    fn skip(&mut self, task: &Task) {
        self.not_run.push(task.id.clone());
    }

    fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.not_run.is_empty()
    }

    /// Whether `task` depends on a task that did not produce its output.
    fn blocks(&self, task: &Task) -> bool {
        task.depends_on.iter().any(|id| {
            self.failed.iter().any(|(f, _)| f == id) || self.not_run.contains(id)
        })
    }
}

impl WorkflowExecutor {
    /// Dispatch each wave of independent tasks concurrently against a
    /// snapshot of the store, then write results back.
    ///
    /// Fail-fast cancels siblings on the first failure and stops; best-effort
    /// lets every branch finish and skips only tasks that depend on a
    /// failure.
    pub(crate) async fn run_parallel(
        &self,
        workflow: &Workflow,
        merge: Option<&MergeStrategy>,
        state: &mut RunState,
    ) -> Result<(), Abort> {
        let policy = workflow.failure_policy().unwrap_or(self.failure_policy);
        let limit = workflow
            .max_concurrency()
            .unwrap_or(self.max_concurrency)
            .max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let waves = &workflow.schedule().waves;

        info!(
            "Executing {} parallel tasks in {} waves ({}, limit {})",
            workflow.tasks().len(),
            waves.len(),
            policy_name(policy),
            limit
        );

        let mut fan_out = FanOut::default();

        for (wave_index, wave) in waves.iter().enumerate() {
            let stop = state.cancel.is_cancelled()
                || (policy == FailurePolicy::FailFast && !fan_out.is_clean());
            if stop {
                fan_out
                    .not_run
                    .extend(waves[wave_index..].iter().flatten().cloned());
                break;
            }

            self.run_wave(workflow, wave, merge.is_some(), policy, &semaphore, state, &mut fan_out)
                .await;
        }

        if let Some(merge) = merge {
            if fan_out.is_clean() || (policy == FailurePolicy::BestEffort && !fan_out.outputs.is_empty()) {
                fan_out.outputs.sort_by(|a, b| a.task_id.cmp(&b.task_id));
                match merge.merger.merge(&fan_out.outputs) {
                    Ok(value) => {
                        info!("Merged {} outputs into '{}'", fan_out.outputs.len(), merge.output_key);
                        state.store.set(merge.output_key.clone(), value);
                    }
                    Err(message) => {
                        return Err(WorkflowError::MergeFailed {
                            key: merge.output_key.clone(),
                            message,
                        }
                        .into());
                    }
                }
            }
        }

        if fan_out.is_clean() {
            return Ok(());
        }
        Err(abort_from(workflow, fan_out))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_wave(
        &self,
        workflow: &Workflow,
        wave: &[String],
        merged: bool,
        policy: FailurePolicy,
        semaphore: &Arc<Semaphore>,
        state: &mut RunState,
        fan_out: &mut FanOut,
    ) {
        // Every branch of the wave renders against the same snapshot.
        let snapshot = VariableStore::with_initial(state.store.snapshot());
        let tasks: Vec<&Task> = wave.iter().filter_map(|id| workflow.task(id)).collect();

        let mut invocations = Vec::with_capacity(tasks.len());
        for task in &tasks {
            if policy == FailurePolicy::BestEffort && fan_out.blocks(task) {
                warn!("Skipping task {}: an upstream task failed", task.id);
                fan_out.skip(task);
                continue;
            }
            match self.prepare(task, &snapshot, None, &state.hints) {
                Ok(invocation) => invocations.push(invocation),
                Err(error) => {
                    let completion = Completion::rejected(task, None, error);
                    state.record(&completion);
                    if let Err(error) = completion.result {
                        fan_out.fail(task, error);
                    }
                }
            }
        }

        if policy == FailurePolicy::FailFast && !fan_out.failed.is_empty() {
            fan_out
                .not_run
                .extend(invocations.into_iter().map(|inv| inv.task_id));
            return;
        }

        let wave_cancel = state.cancel.child_token();
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut set = JoinSet::new();
        for invocation in invocations {
            pending.insert(invocation.task_id.clone());
            let permits = semaphore.clone();
            let cancel = wave_cancel.clone();
            set.spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = permits.acquire_owned().await.ok();
                task_runner::invoke(invocation, cancel).await
            });
        }

        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), *t)).collect();
        let mut finished: Vec<(String, Option<String>, AgentOutput)> = Vec::new();

        while let Some(joined) = set.join_next().await {
            let completion = match joined {
                Ok(completion) => completion,
                Err(join_error) => {
                    error!("Parallel branch aborted: {}", join_error);
                    continue;
                }
            };
            pending.remove(&completion.task_id);
            state.record(&completion);

            let Some(task) = by_id.get(completion.task_id.as_str()).copied() else {
                continue;
            };
            match completion.result {
                Ok(output) => {
                    fan_out.completed.push(task.id.clone());
                    finished.push((task.id.clone(), task.output_key.clone(), output));
                }
                Err(WorkflowError::Cancelled) => fan_out.skip(task),
                Err(error) => {
                    warn!("Parallel task {} failed: {}", task.id, error);
                    fan_out.fail(task, error);
                    if policy == FailurePolicy::FailFast {
                        wave_cancel.cancel();
                    }
                }
            }
        }

        for task_id in pending {
            if let Some(task) = by_id.get(task_id.as_str()) {
                fan_out.fail(
                    task,
                    WorkflowError::TaskExecutionFailure {
                        task_id: task.id.clone(),
                        source: AgentError::Aborted,
                    },
                );
            }
        }

        // Keys are disjoint within a wave; sort for a stable write order.
        finished.sort_by(|a, b| a.0.cmp(&b.0));
        for (task_id, output_key, output) in finished {
            if merged {
                fan_out.outputs.push(BranchOutput {
                    task_id,
                    output: output.payload,
                });
            } else {
                state.write_back(&task_id, output_key.as_deref(), output);
            }
        }
    }
}

fn policy_name(policy: FailurePolicy) -> &'static str {
    match policy {
        FailurePolicy::FailFast => "fail-fast",
        FailurePolicy::BestEffort => "best-effort",
    }
}

/// Report the first failure in declaration order, listing which branches
/// finished and which did not.
fn abort_from(workflow: &Workflow, fan_out: FanOut) -> Abort {
    let position = |id: &str| {
        workflow
            .tasks()
            .iter()
            .position(|t| t.id == id)
            .unwrap_or(usize::MAX)
    };

    let mut failed = fan_out.failed;
    failed.sort_by_key(|(id, _)| position(id.as_str()));
    let mut incomplete: Vec<String> = failed
        .iter()
        .map(|(id, _)| id.clone())
        .chain(fan_out.not_run)
        .collect();
    incomplete.sort_by_key(|id| position(id.as_str()));
    incomplete.dedup();

    let mut completed = fan_out.completed;
    completed.sort_by_key(|id| position(id.as_str()));

    let error = failed
        .into_iter()
        .next()
        .map(|(_, error)| error)
        .unwrap_or(WorkflowError::Cancelled);

    Abort {
        error,
        completed,
        incomplete,
    }
}
