//! Dependency resolution for task collections.

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WorkflowError;
use crate::task::Task;

/// A valid execution order for a set of tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Linear order; every task appears after all of its predecessors.
    pub order: Vec<String>,
    /// Groups of tasks whose predecessors all lie in earlier waves. Tasks
    /// in the same wave have no ordering constraint between them.
    pub waves: Vec<Vec<String>>,
}

impl Schedule {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Position of `task_id` in the linear order.
    pub fn position(&self, task_id: &str) -> Option<usize> {
        self.order.iter().position(|id| id == task_id)
    }
}

/// Computes execution order from `depends_on` alone.
///
/// Input and output keys never add ordering: a task that reads a key
/// another task writes, without declaring `depends_on`, reads whatever the
/// store held when it was dispatched. Ties between simultaneously eligible
/// tasks resolve by declaration order.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Resolve `tasks` into a schedule, failing fast on cycles.
    pub fn resolve(tasks: &[Task]) -> Result<Schedule, WorkflowError> {
        let predecessors = Self::predecessors(tasks)?;
        let n = tasks.len();

        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree: Vec<usize> = vec![0; n];
        for (i, preds) in predecessors.iter().enumerate() {
            in_degree[i] = preds.len();
            for &p in preds {
                successors[p].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut level = vec![0usize; n];

        while let Some(current) = ready.pop_first() {
            order.push(current);
            for &next in &successors[current] {
                level[next] = level[next].max(level[current] + 1);
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < n {
            let task_ids = Self::cycle_members(&successors, &order, n)
                .into_iter()
                .map(|i| tasks[i].id.clone())
                .collect();
            return Err(WorkflowError::CyclicDependency { task_ids });
        }

        let wave_count = order.iter().map(|&i| level[i] + 1).max().unwrap_or(0);
        let mut waves: Vec<Vec<usize>> = vec![Vec::new(); wave_count];
        for &i in &order {
            waves[level[i]].push(i);
        }

        let schedule = Schedule {
            order: order.iter().map(|&i| tasks[i].id.clone()).collect(),
            waves: waves
                .into_iter()
                .map(|mut wave| {
                    wave.sort_unstable();
                    wave.into_iter().map(|i| tasks[i].id.clone()).collect()
                })
                .collect(),
        };

        debug!(
            "Resolved {} tasks into {} waves",
            schedule.order.len(),
            schedule.waves.len()
        );
        Ok(schedule)
    }

    fn predecessors(tasks: &[Task]) -> Result<Vec<BTreeSet<usize>>, WorkflowError> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.id.as_str(), i).is_some() {
                return Err(WorkflowError::DuplicateTask(task.id.clone()));
            }
        }

        let mut predecessors = vec![BTreeSet::new(); tasks.len()];
        for (i, task) in tasks.iter().enumerate() {
            for dependency in &task.depends_on {
                let &j = index.get(dependency.as_str()).ok_or_else(|| {
                    WorkflowError::UnknownDependency {
                        task_id: task.id.clone(),
                        dependency: dependency.clone(),
                    }
                })?;
                predecessors[i].insert(j);
            }
        }
        Ok(predecessors)
    }

    /// Tasks that lie on a cycle or between cycles.
    ///
    /// Starts from everything Kahn's algorithm could not schedule and
    /// repeatedly drops nodes with no successor left in the set, which
    /// removes tasks that are merely downstream of a cycle.
    fn cycle_members(successors: &[Vec<usize>], scheduled: &[usize], n: usize) -> Vec<usize> {
        let scheduled: BTreeSet<usize> = scheduled.iter().copied().collect();
        let mut remaining: BTreeSet<usize> = (0..n).filter(|i| !scheduled.contains(i)).collect();

        loop {
            let prunable: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&i| !successors[i].iter().any(|s| remaining.contains(s)))
                .collect();
            if prunable.is_empty() {
                break;
            }
            for i in prunable {
                remaining.remove(&i);
            }
        }

        remaining.into_iter().collect()
    }
}
