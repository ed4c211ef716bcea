//! Single task invocation: timeout, cancellation and trace recording.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use taskloom_protocols::{Agent, AgentError, AgentOutput, Variables};

use crate::error::WorkflowError;
use crate::store::VariableStore;
use crate::strategy::Hints;
use crate::task::Task;

use super::report::{LoopOutcome, TaskOutcome, TraceEntry};

/// A task with its instruction rendered and its agent chosen.
pub(crate) struct Invocation {
    pub task_id: String,
    pub role: String,
    pub output_key: Option<String>,
    pub iteration: Option<u32>,
    pub agent: Arc<dyn Agent>,
    pub instruction: String,
    pub parameters: Variables,
    pub timeout: Duration,
}

/// What happened to one task, ready to be traced.
pub(crate) struct Completion {
    pub task_id: String,
    pub role: String,
    pub output_key: Option<String>,
    pub iteration: Option<u32>,
    pub agent_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub result: Result<AgentOutput, WorkflowError>,
}

impl Completion {
    /// A task that failed before any agent was invoked.
    pub fn rejected(task: &Task, iteration: Option<u32>, error: WorkflowError) -> Self {
        Self {
            task_id: task.id.clone(),
            role: task.role.clone(),
            output_key: task.output_key.clone(),
            iteration,
            agent_id: None,
            started_at: Utc::now(),
            duration_ms: 0,
            result: Err(error),
        }
    }
}

/// Call the agent, bounded by the task timeout and the cancellation token.
pub(crate) async fn invoke(invocation: Invocation, cancel: CancellationToken) -> Completion {
    let started_at = Utc::now();
    let start = Instant::now();
    debug!(
        "Dispatching task {} to agent {} ({})",
        invocation.task_id,
        invocation.agent.id(),
        invocation.role
    );

    let call = invocation.agent.execute(
        &invocation.role,
        &invocation.instruction,
        &invocation.parameters,
    );

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WorkflowError::Cancelled),
        outcome = tokio::time::timeout(invocation.timeout, call) => match outcome {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(WorkflowError::TaskExecutionFailure {
                task_id: invocation.task_id.clone(),
                source,
            }),
            Err(_) => {
                warn!("Task {} timed out", invocation.task_id);
                Err(WorkflowError::TaskExecutionFailure {
                    task_id: invocation.task_id.clone(),
                    source: AgentError::Timeout(invocation.timeout.as_millis() as u64),
                })
            }
        },
    };

    Completion {
        agent_id: Some(invocation.agent.id().to_string()),
        task_id: invocation.task_id,
        role: invocation.role,
        output_key: invocation.output_key,
        iteration: invocation.iteration,
        started_at,
        duration_ms: start.elapsed().as_millis() as u64,
        result,
    }
}

/// Mutable state of one run, threaded through the pattern implementations.
pub(crate) struct RunState {
    pub store: VariableStore,
    pub trace: Vec<TraceEntry>,
    pub cancel: CancellationToken,
    pub hints: Hints,
    pub loop_outcome: Option<LoopOutcome>,
    pub branch: Option<String>,
}

impl RunState {
    pub fn new(initial: Variables, cancel: CancellationToken, hints: Hints) -> Self {
        Self {
            store: VariableStore::with_initial(initial),
            trace: Vec::new(),
            cancel,
            hints,
            loop_outcome: None,
            branch: None,
        }
    }

    /// Append `completion` to the trace.
    pub fn record(&mut self, completion: &Completion) {
        let outcome = match &completion.result {
            Ok(output) => TaskOutcome::Completed {
                output_key: completion.output_key.clone(),
                output: output.payload.clone(),
                metadata: output.metadata.clone(),
            },
            Err(WorkflowError::Cancelled) => TaskOutcome::Cancelled,
            Err(error) => TaskOutcome::failed(error),
        };

        self.trace.push(TraceEntry {
            sequence: self.trace.len(),
            task_id: completion.task_id.clone(),
            role: completion.role.clone(),
            agent_id: completion.agent_id.clone(),
            iteration: completion.iteration,
            outcome,
            started_at: completion.started_at,
            duration_ms: completion.duration_ms,
        });
    }

    /// Write a task's payload under its output key.
    pub fn write_back(&self, task_id: &str, output_key: Option<&str>, output: AgentOutput) {
        if let Some(key) = output_key {
            debug!("Task {} wrote '{}'", task_id, key);
            self.store.set(key, output.payload);
        }
    }
}

/// A failure that ends a run, with the fan-out bookkeeping when a PARALLEL
/// workflow was involved.
#[derive(Debug)]
pub(crate) struct Abort {
    pub error: WorkflowError,
    pub completed: Vec<String>,
    pub incomplete: Vec<String>,
}

impl From<WorkflowError> for Abort {
    fn from(error: WorkflowError) -> Self {
        Self {
            error,
            completed: Vec::new(),
            incomplete: Vec::new(),
        }
    }
}
