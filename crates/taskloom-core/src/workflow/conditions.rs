//! Loop exit conditions and conditional branch selection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::VariableStore;
use crate::substitution::stringify;

/// Predicate deciding whether a LOOP stops after an iteration.
pub trait ExitCondition: Send + Sync {
    /// `completed_iterations` counts the iteration that just finished.
    fn is_met(&self, store: &VariableStore, completed_iterations: u32) -> bool;
}

impl<F> ExitCondition for F
where
    F: Fn(&VariableStore, u32) -> bool + Send + Sync,
{
    fn is_met(&self, store: &VariableStore, completed_iterations: u32) -> bool {
        self(store, completed_iterations)
    }
}

/// Maps the current store to the key of the branch a CONDITIONAL runs.
pub trait BranchSelector: Send + Sync {
    /// `None` means the store carries no routing information at all.
    fn select(&self, store: &VariableStore) -> Option<String>;
}

impl<F> BranchSelector for F
where
    F: Fn(&VariableStore) -> Option<String> + Send + Sync,
{
    fn select(&self, store: &VariableStore) -> Option<String> {
        self(store)
    }
}

/// JSON truthiness: `false`, `null`, `0`, `""`, `[]` and `{}` are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Declarative condition over the variable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionSpec {
    /// Never met; a LOOP with this condition always runs to its cap.
    Never,
    /// The key holds a value.
    Present { key: String },
    /// The value at the path is truthy.
    Truthy { key: String },
    /// The value at the path equals `value`.
    Equals { key: String, value: Value },
    /// The value at the path is a number `>= threshold`.
    AtLeast { key: String, threshold: f64 },
    /// A small expression such as `review.score >= 8` or `approved`.
    Expression { expr: String },
    All { conditions: Vec<ConditionSpec> },
    Any { conditions: Vec<ConditionSpec> },
}

impl ConditionSpec {
    pub fn evaluate(&self, store: &VariableStore) -> bool {
        match self {
            Self::Never => false,
            Self::Present { key } => store.get_path(key).is_some(),
            Self::Truthy { key } => store.get_path(key).is_some_and(|v| is_truthy(&v)),
            Self::Equals { key, value } => store.get_path(key).is_some_and(|v| &v == value),
            Self::AtLeast { key, threshold } => store
                .get_path(key)
                .and_then(|v| v.as_f64())
                .is_some_and(|n| n >= *threshold),
            Self::Expression { expr } => evaluate_expression(expr, store),
            Self::All { conditions } => conditions.iter().all(|c| c.evaluate(store)),
            Self::Any { conditions } => conditions.iter().any(|c| c.evaluate(store)),
        }
    }
}

impl ExitCondition for ConditionSpec {
    fn is_met(&self, store: &VariableStore, _completed_iterations: u32) -> bool {
        self.evaluate(store)
    }
}

/// Comparison operators, longest first so `>=` is not read as `>`.
const OPERATORS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];

/// Evaluate `left OP right` or a bare path.
///
/// The left side is a dotted store path. The right side is a literal:
/// quotes are stripped; numeric comparison applies when both sides are
/// numbers, otherwise `==`/`!=` compare the rendered strings. A bare path
/// is tested for truthiness. A missing left side makes every comparison
/// false except `!=`.
pub fn evaluate_expression(expr: &str, store: &VariableStore) -> bool {
    let expr = expr.trim();

    let Some((left, op, right)) = OPERATORS
        .iter()
        .find_map(|op| expr.split_once(op).map(|(l, r)| (l.trim(), *op, r.trim())))
    else {
        return store.get_path(expr).is_some_and(|v| is_truthy(&v));
    };

    let right = right.trim_matches('"').trim_matches('\'');
    let Some(value) = store.get_path(left) else {
        return op == "!=";
    };

    if let (Some(l), Ok(r)) = (value.as_f64(), right.parse::<f64>()) {
        return match op {
            ">=" => l >= r,
            "<=" => l <= r,
            ">" => l > r,
            "<" => l < r,
            "==" => l == r,
            _ => l != r,
        };
    }

    let rendered = stringify(&value);
    match op {
        "==" => rendered == right,
        "!=" => rendered != right,
        _ => false,
    }
}

/// One routing rule: when `when` holds, take `branch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchRule {
    pub when: ConditionSpec,
    pub branch: String,
}

/// Declarative branch selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BranchSpec {
    /// The rendered value at the path is the branch key.
    Variable { key: String },
    /// First matching rule wins, else `otherwise`.
    Rules {
        rules: Vec<BranchRule>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<String>,
    },
}

impl BranchSelector for BranchSpec {
    fn select(&self, store: &VariableStore) -> Option<String> {
        match self {
            Self::Variable { key } => store.get_path(key).map(|v| stringify(&v)),
            Self::Rules { rules, otherwise } => rules
                .iter()
                .find(|rule| rule.when.evaluate(store))
                .map(|rule| rule.branch.clone())
                .or_else(|| otherwise.clone()),
        }
    }
}
