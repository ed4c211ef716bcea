//! Common map types used across the engine boundary.

use std::collections::BTreeMap;

/// Keyed values flowing through a workflow run.
///
/// Ordered so that snapshots, reports and serialized output are stable
/// across runs with identical inputs.
pub type Variables = BTreeMap<String, serde_json::Value>;

/// Parameters handed to an agent alongside its instruction.
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// Metadata map type.
pub type Metadata = BTreeMap<String, serde_json::Value>;
