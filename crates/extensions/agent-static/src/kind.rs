//! Agent kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Behaviour of a [`StaticAgent`](crate::StaticAgent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaticKind {
    /// Returns the instruction as content.
    Writer,
    /// Scores the instruction and gives feedback.
    Reviewer,
    /// Returns the instruction as a new revision.
    Refiner,
    /// Reflects role, instruction and parameters.
    Echo,
}

impl StaticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Writer => "writer",
            Self::Reviewer => "reviewer",
            Self::Refiner => "refiner",
            Self::Echo => "echo",
        }
    }
}

impl fmt::Display for StaticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown agent kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for StaticKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "writer" => Ok(Self::Writer),
            "reviewer" => Ok(Self::Reviewer),
            "refiner" => Ok(Self::Refiner),
            "echo" => Ok(Self::Echo),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}
