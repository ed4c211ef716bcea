//! Task descriptors.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use taskloom_protocols::Parameters;

use crate::substitution;
use crate::workflow::WorkflowPattern;

/// An immutable description of one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique within a workflow run.
    pub id: String,

    /// Capability tag used to look up an agent (writer, reviewer, ...).
    pub role: String,

    /// Instruction with `{key}` placeholders.
    #[serde(alias = "instruction")]
    pub instruction_template: String,

    /// Task-local values, merged over the projected store when substituting.
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,

    /// Tasks that must complete before this one starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Store keys this task reads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_keys: Vec<String>,

    /// Store key the result is written under. `None` means side-effect only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    /// Maximum wall-clock time for the agent call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Declares that this task intentionally overwrites a key written by an
    /// earlier task of the same run.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_overwrite: bool,

    /// Pattern this task is pinned to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<WorkflowPattern>,
}

impl Task {
    /// Create a new task.
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        instruction_template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            instruction_template: instruction_template.into(),
            parameters: Parameters::new(),
            depends_on: Vec::new(),
            input_keys: Vec::new(),
            output_key: None,
            timeout_secs: None,
            allow_overwrite: false,
            pattern: None,
        }
    }

    /// Set the output key.
    pub fn with_output(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Add a hard predecessor. Duplicates are ignored.
    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if !self.depends_on.contains(&task_id) {
            self.depends_on.push(task_id);
        }
        self
    }

    /// Declare a store key this task reads. Duplicates are ignored.
    pub fn reads(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !self.input_keys.contains(&key) {
            self.input_keys.push(key);
        }
        self
    }

    /// Set a task parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Pin the task to a workflow pattern.
    pub fn with_pattern(mut self, pattern: WorkflowPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Declare an intentional overwrite of an earlier task's output key.
    pub fn allow_overwrite(mut self) -> Self {
        self.allow_overwrite = true;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Store keys the task actually reads.
    ///
    /// The declared `input_keys` when there are any; otherwise the root of
    /// every placeholder in the template that the task's own parameters do
    /// not supply.
    pub fn effective_input_keys(&self) -> Vec<String> {
        if !self.input_keys.is_empty() {
            return self.input_keys.clone();
        }

        let mut keys = Vec::new();
        for placeholder in substitution::placeholders(&self.instruction_template) {
            let root = substitution::root_segment(&placeholder).to_string();
            if !self.parameters.contains_key(&root) && !keys.contains(&root) {
                keys.push(root);
            }
        }
        keys
    }
}
