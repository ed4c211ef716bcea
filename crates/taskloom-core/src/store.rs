//! Per-run variable store.

use dashmap::DashMap;
use serde_json::Value;

use taskloom_protocols::Variables;

use crate::substitution;

/// Keyed values shared by the tasks of one workflow run.
///
/// Backed by a sharded map: a read observes either a whole value or none,
/// and writes to distinct keys never contend on the same lock. A store is
/// created at run start and dropped when the run ends.
#[derive(Debug, Default)]
pub struct VariableStore {
    values: DashMap<String, Value>,
}

impl VariableStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with caller-supplied variables.
    pub fn with_initial(initial: Variables) -> Self {
        let store = Self::new();
        for (key, value) in initial {
            store.values.insert(key, value);
        }
        store
    }

    /// Get a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    /// Get the value at a dotted path such as `review.score`.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let root = substitution::root_segment(path);
        let value = self.get(root)?;
        if root.len() == path.len() {
            return Some(value);
        }
        let context = Variables::from([(root.to_string(), value)]);
        substitution::lookup(path, &context).cloned()
    }

    /// Check whether `key` holds a value.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Copy out the subset of the store named by `keys`. Absent keys are
    /// skipped.
    pub fn project<'a, I>(&self, keys: I) -> Variables
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Copy out the whole store.
    pub fn snapshot(&self) -> Variables {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// All keys currently present, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Variables> for VariableStore {
    fn from(initial: Variables) -> Self {
        Self::with_initial(initial)
    }
}
