//! Runnable workflows and their construction-time validation.

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::error::WorkflowError;
use crate::resolver::{DependencyResolver, Schedule};
use crate::task::Task;

use super::conditions::{BranchSelector, ConditionSpec, ExitCondition};
use super::definition::{
    BranchDefinition, FailurePolicy, WorkflowDefinition, WorkflowPattern, WorkflowScope,
};
use super::merge::OutputMerger;

/// Default iteration cap of a LOOP loaded from a definition.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Merge step of a PARALLEL workflow.
#[derive(Clone)]
pub struct MergeStrategy {
    /// Key receiving the merged value.
    pub output_key: String,
    pub merger: Arc<dyn OutputMerger>,
}

/// What a CONDITIONAL branch runs.
#[derive(Debug, Clone)]
pub enum Branch {
    Task(Task),
    Workflow(Box<Workflow>),
}

/// Pattern-specific parameters.
#[derive(Clone)]
pub enum WorkflowKind {
    Sequential,
    Parallel {
        merge: Option<MergeStrategy>,
    },
    Loop {
        max_iterations: u32,
        exit_condition: Arc<dyn ExitCondition>,
    },
    Conditional {
        selector: Arc<dyn BranchSelector>,
        branches: BTreeMap<String, Branch>,
    },
}

impl WorkflowKind {
    pub fn pattern(&self) -> WorkflowPattern {
        match self {
            Self::Sequential => WorkflowPattern::Sequential,
            Self::Parallel { .. } => WorkflowPattern::Parallel,
            Self::Loop { .. } => WorkflowPattern::Loop,
            Self::Conditional { .. } => WorkflowPattern::Conditional,
        }
    }
}

impl std::fmt::Debug for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => f.write_str("Sequential"),
            Self::Parallel { merge } => f
                .debug_struct("Parallel")
                .field("merge_key", &merge.as_ref().map(|m| m.output_key.as_str()))
                .finish(),
            Self::Loop { max_iterations, .. } => f
                .debug_struct("Loop")
                .field("max_iterations", max_iterations)
                .finish_non_exhaustive(),
            Self::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("branches", &branches.keys().collect::<Vec<_>>())
                .finish_non_exhaustive(),
        }
    }
}

/// A validated, runnable workflow.
///
/// Only obtainable through [`WorkflowBuilder::build`] or
/// [`Workflow::from_definition`], so graph errors never surface mid-run.
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    description: Option<String>,
    scope: WorkflowScope,
    tasks: Vec<Task>,
    kind: WorkflowKind,
    failure_policy: Option<FailurePolicy>,
    max_concurrency: Option<usize>,
    schedule: Schedule,
}

impl Workflow {
    pub fn sequential(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(name, PendingKind::Sequential)
    }

    pub fn parallel(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(name, PendingKind::Parallel)
    }

    /// A LOOP that stops when `exit_condition` holds or after
    /// `max_iterations`, whichever comes first.
    pub fn looping(
        name: impl Into<String>,
        max_iterations: u32,
        exit_condition: impl ExitCondition + 'static,
    ) -> WorkflowBuilder {
        WorkflowBuilder::new(
            name,
            PendingKind::Loop {
                max_iterations,
                exit_condition: Arc::new(exit_condition),
            },
        )
    }

    pub fn conditional(
        name: impl Into<String>,
        selector: impl BranchSelector + 'static,
    ) -> WorkflowBuilder {
        WorkflowBuilder::new(
            name,
            PendingKind::Conditional {
                selector: Arc::new(selector),
            },
        )
    }

    /// Build a workflow from its declarative form.
    pub fn from_definition(def: &WorkflowDefinition) -> Result<Self, WorkflowError> {
        let mut builder = match def.pattern {
            WorkflowPattern::Sequential => Self::sequential(&def.name),
            WorkflowPattern::Parallel => {
                let builder = Self::parallel(&def.name);
                match &def.merge {
                    Some(merge) => builder.merge(&merge.output_key, merge.strategy.clone()),
                    None => builder,
                }
            }
            WorkflowPattern::Loop => Self::looping(
                &def.name,
                def.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
                def.exit_condition.clone().unwrap_or(ConditionSpec::Never),
            ),
            WorkflowPattern::Conditional => {
                let selector = def.branch_on.clone().ok_or_else(|| {
                    WorkflowError::invalid(&def.name, "conditional workflow needs 'branch_on'")
                })?;
                let mut builder = Self::conditional(&def.name, selector);
                for (key, branch) in &def.branches {
                    builder = match branch {
                        BranchDefinition::Task(task) => builder.branch_task(key, task.clone()),
                        BranchDefinition::Workflow(sub) => {
                            builder.branch_workflow(key, Self::from_definition(sub)?)
                        }
                    };
                }
                builder
            }
        };

        if def.pattern != WorkflowPattern::Parallel && def.merge.is_some() {
            return Err(WorkflowError::invalid(&def.name, "'merge' applies to parallel workflows only"));
        }
        if def.pattern != WorkflowPattern::Loop
            && (def.max_iterations.is_some() || def.exit_condition.is_some())
        {
            return Err(WorkflowError::invalid(
                &def.name,
                "'max_iterations' and 'exit_condition' apply to loop workflows only",
            ));
        }
        if def.pattern != WorkflowPattern::Conditional
            && (def.branch_on.is_some() || !def.branches.is_empty())
        {
            return Err(WorkflowError::invalid(
                &def.name,
                "'branch_on' and 'branches' apply to conditional workflows only",
            ));
        }

        builder = builder.scope(def.scope).tasks(def.tasks.iter().cloned());
        if let Some(description) = &def.description {
            builder = builder.description(description);
        }
        if let Some(policy) = def.failure_policy {
            builder = builder.failure_policy(policy);
        }
        if let Some(limit) = def.max_concurrency {
            builder = builder.max_concurrency(limit);
        }
        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn scope(&self) -> WorkflowScope {
        self.scope
    }

    pub fn pattern(&self) -> WorkflowPattern {
        self.kind.pattern()
    }

    pub fn kind(&self) -> &WorkflowKind {
        &self.kind
    }

    /// Tasks of the pattern. For CONDITIONAL these run before routing.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Resolved execution order of [`tasks`](Self::tasks).
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Policy set on the workflow itself, if any.
    pub fn failure_policy(&self) -> Option<FailurePolicy> {
        self.failure_policy
    }

    pub fn max_concurrency(&self) -> Option<usize> {
        self.max_concurrency
    }

    /// Roles needed to run every path of this workflow, sorted.
    pub fn roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.tasks.iter().map(|t| t.role.clone()).collect();
        if let WorkflowKind::Conditional { branches, .. } = &self.kind {
            for branch in branches.values() {
                match branch {
                    Branch::Task(task) => roles.push(task.role.clone()),
                    Branch::Workflow(sub) => roles.extend(sub.roles()),
                }
            }
        }
        roles.sort();
        roles.dedup();
        roles
    }
}

enum PendingKind {
    Sequential,
    Parallel,
    Loop {
        max_iterations: u32,
        exit_condition: Arc<dyn ExitCondition>,
    },
    Conditional {
        selector: Arc<dyn BranchSelector>,
    },
}

/// Builder for [`Workflow`]. Validation happens in [`build`](Self::build).
pub struct WorkflowBuilder {
    name: String,
    description: Option<String>,
    scope: WorkflowScope,
    tasks: Vec<Task>,
    kind: PendingKind,
    merge: Option<MergeStrategy>,
    branches: BTreeMap<String, Branch>,
    failure_policy: Option<FailurePolicy>,
    max_concurrency: Option<usize>,
}

impl WorkflowBuilder {
    fn new(name: impl Into<String>, kind: PendingKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            scope: WorkflowScope::default(),
            tasks: Vec::new(),
            kind,
            merge: None,
            branches: BTreeMap::new(),
            failure_policy: None,
            max_concurrency: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn scope(mut self, scope: WorkflowScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Combine the fan-out into `output_key`. PARALLEL only.
    pub fn merge(mut self, output_key: impl Into<String>, merger: impl OutputMerger + 'static) -> Self {
        self.merge = Some(MergeStrategy {
            output_key: output_key.into(),
            merger: Arc::new(merger),
        });
        self
    }

    /// Register a handler for a branch key. CONDITIONAL only.
    pub fn branch(mut self, key: impl Into<String>, branch: Branch) -> Self {
        self.branches.insert(key.into(), branch);
        self
    }

    pub fn branch_task(self, key: impl Into<String>, task: Task) -> Self {
        self.branch(key, Branch::Task(task))
    }

    pub fn branch_workflow(self, key: impl Into<String>, workflow: Workflow) -> Self {
        self.branch(key, Branch::Workflow(Box::new(workflow)))
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    /// Bound on concurrently running PARALLEL branches.
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// Validate and produce the workflow.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let name = self.name;
        if name.trim().is_empty() {
            return Err(WorkflowError::invalid(&name, "workflow name must not be empty"));
        }
        if self.max_concurrency == Some(0) {
            return Err(WorkflowError::invalid(&name, "max_concurrency must be at least 1"));
        }
        if self.merge.is_some() && !matches!(self.kind, PendingKind::Parallel) {
            return Err(WorkflowError::invalid(&name, "only parallel workflows take a merge"));
        }
        if !self.branches.is_empty() && !matches!(self.kind, PendingKind::Conditional { .. }) {
            return Err(WorkflowError::invalid(&name, "only conditional workflows take branches"));
        }
        for task in &self.tasks {
            validate_task(&name, task)?;
        }

        let schedule = DependencyResolver::resolve(&self.tasks)?;

        let kind = match self.kind {
            PendingKind::Sequential => {
                require_tasks(&name, &self.tasks)?;
                check_overwrites(&self.tasks, &schedule.order)?;
                WorkflowKind::Sequential
            }
            PendingKind::Loop {
                max_iterations,
                exit_condition,
            } => {
                if max_iterations == 0 {
                    return Err(WorkflowError::invalid(&name, "max_iterations must be at least 1"));
                }
                require_tasks(&name, &self.tasks)?;
                check_overwrites(&self.tasks, &schedule.order)?;
                WorkflowKind::Loop {
                    max_iterations,
                    exit_condition,
                }
            }
            PendingKind::Parallel => {
                require_tasks(&name, &self.tasks)?;
                match &self.merge {
                    Some(merge) => {
                        if merge.output_key.trim().is_empty() {
                            return Err(WorkflowError::invalid(&name, "merge output key must not be empty"));
                        }
                        if schedule.waves.len() > 1 {
                            return Err(WorkflowError::invalid(
                                &name,
                                "a merged parallel workflow cannot have dependencies between its tasks",
                            ));
                        }
                    }
                    None => {
                        for wave in &schedule.waves {
                            check_wave_conflicts(&self.tasks, wave)?;
                        }
                        check_overwrites(&self.tasks, &schedule.order)?;
                    }
                }
                WorkflowKind::Parallel { merge: self.merge }
            }
            PendingKind::Conditional { selector } => {
                if self.branches.is_empty() {
                    return Err(WorkflowError::invalid(&name, "conditional workflow needs at least one branch"));
                }
                check_overwrites(&self.tasks, &schedule.order)?;
                for (key, branch) in &self.branches {
                    if key.is_empty() {
                        return Err(WorkflowError::invalid(&name, "branch key must not be empty"));
                    }
                    if let Branch::Task(task) = branch {
                        validate_branch_task(&name, &self.tasks, &schedule.order, task)?;
                    }
                }
                WorkflowKind::Conditional {
                    selector,
                    branches: self.branches,
                }
            }
        };

        debug!(
            "Built {} workflow '{}' with {} tasks",
            kind.pattern(),
            name,
            self.tasks.len()
        );

        Ok(Workflow {
            name,
            description: self.description,
            scope: self.scope,
            tasks: self.tasks,
            kind,
            failure_policy: self.failure_policy,
            max_concurrency: self.max_concurrency,
            schedule,
        })
    }
}

fn validate_task(workflow: &str, task: &Task) -> Result<(), WorkflowError> {
    if task.id.trim().is_empty() {
        return Err(WorkflowError::invalid(workflow, "task id must not be empty"));
    }
    if task.role.trim().is_empty() {
        return Err(WorkflowError::invalid(
            workflow,
            format!("task '{}' has an empty role", task.id),
        ));
    }
    if task.output_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
        return Err(WorkflowError::invalid(
            workflow,
            format!("task '{}' has an empty output key", task.id),
        ));
    }
    if task.timeout_secs == Some(0) {
        return Err(WorkflowError::invalid(
            workflow,
            format!("task '{}' has a zero timeout", task.id),
        ));
    }
    Ok(())
}

fn require_tasks(workflow: &str, tasks: &[Task]) -> Result<(), WorkflowError> {
    if tasks.is_empty() {
        return Err(WorkflowError::invalid(workflow, "workflow has no tasks"));
    }
    Ok(())
}

/// A key written twice in `order` needs `allow_overwrite` on the later task.
fn check_overwrites(tasks: &[Task], order: &[String]) -> Result<(), WorkflowError> {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut writers: HashMap<&str, &str> = HashMap::new();

    for id in order {
        let Some(task) = by_id.get(id.as_str()) else {
            continue;
        };
        let Some(key) = task.output_key.as_deref() else {
            continue;
        };
        if let Some(previous) = writers.insert(key, task.id.as_str()) {
            if !task.allow_overwrite {
                return Err(WorkflowError::WriteConflict {
                    key: key.to_string(),
                    task_ids: vec![previous.to_string(), task.id.clone()],
                });
            }
        }
    }
    Ok(())
}

/// Siblings of one fan-out wave must write disjoint keys.
fn check_wave_conflicts(tasks: &[Task], wave: &[String]) -> Result<(), WorkflowError> {
    let members: HashSet<&str> = wave.iter().map(String::as_str).collect();
    let mut writers: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for task in tasks.iter().filter(|t| members.contains(t.id.as_str())) {
        if let Some(key) = task.output_key.as_deref() {
            writers.entry(key).or_default().push(task.id.clone());
        }
    }

    match writers.into_iter().find(|(_, ids)| ids.len() > 1) {
        Some((key, task_ids)) => Err(WorkflowError::WriteConflict {
            key: key.to_string(),
            task_ids,
        }),
        None => Ok(()),
    }
}

fn validate_branch_task(
    workflow: &str,
    preamble: &[Task],
    order: &[String],
    task: &Task,
) -> Result<(), WorkflowError> {
    validate_task(workflow, task)?;
    for dependency in &task.depends_on {
        if dependency == &task.id {
            return Err(WorkflowError::CyclicDependency {
                task_ids: vec![task.id.clone()],
            });
        }
        if !preamble.iter().any(|t| &t.id == dependency) {
            return Err(WorkflowError::UnknownDependency {
                task_id: task.id.clone(),
                dependency: dependency.clone(),
            });
        }
    }
    if preamble.iter().any(|t| t.id == task.id) {
        return Err(WorkflowError::DuplicateTask(task.id.clone()));
    }

    let mut path: Vec<Task> = preamble.to_vec();
    path.push(task.clone());
    let mut path_order = order.to_vec();
    path_order.push(task.id.clone());
    check_overwrites(&path, &path_order)
}
