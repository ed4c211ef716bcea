//! Combining the outputs of a PARALLEL fan-out.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::substitution::stringify;

/// Output of one parallel branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchOutput {
    pub task_id: String,
    pub output: Value,
}

/// Combines branch outputs into the value written under the merge key.
///
/// Outputs are always passed sorted by task id, whatever order the
/// branches finished in.
pub trait OutputMerger: Send + Sync {
    fn merge(&self, outputs: &[BranchOutput]) -> Result<Value, String>;
}

impl<F> OutputMerger for F
where
    F: Fn(&[BranchOutput]) -> Result<Value, String> + Send + Sync,
{
    fn merge(&self, outputs: &[BranchOutput]) -> Result<Value, String> {
        self(outputs)
    }
}

fn default_separator() -> String {
    "\n\n".to_string()
}

/// Built-in merge strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergeSpec {
    /// Object of task id to output.
    Collect,
    /// Output of the lowest task id.
    First,
    /// Output with the highest numeric value at `field`; ties go to the
    /// lowest task id.
    HighestScore { field: String },
    /// Outputs rendered as text and joined.
    Concat {
        #[serde(default = "default_separator")]
        separator: String,
    },
}

fn score_at(output: &Value, field: &str) -> Option<f64> {
    let mut current = output;
    for part in field.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    current.as_f64()
}

impl OutputMerger for MergeSpec {
    fn merge(&self, outputs: &[BranchOutput]) -> Result<Value, String> {
        match self {
            Self::Collect => Ok(Value::Object(
                outputs
                    .iter()
                    .map(|b| (b.task_id.clone(), b.output.clone()))
                    .collect::<Map<String, Value>>(),
            )),
            Self::First => outputs
                .first()
                .map(|b| b.output.clone())
                .ok_or_else(|| "no branch produced an output".to_string()),
            Self::HighestScore { field } => {
                let mut best: Option<(f64, &BranchOutput)> = None;
                for branch in outputs {
                    let Some(score) = score_at(&branch.output, field) else {
                        continue;
                    };
                    if best.is_none_or(|(top, _)| score > top) {
                        best = Some((score, branch));
                    }
                }
                best.map(|(_, b)| b.output.clone())
                    .ok_or_else(|| format!("no branch output carries a numeric '{}'", field))
            }
            Self::Concat { separator } => Ok(Value::String(
                outputs
                    .iter()
                    .map(|b| stringify(&b.output))
                    .collect::<Vec<_>>()
                    .join(separator.as_str()),
            )),
        }
    }
}
