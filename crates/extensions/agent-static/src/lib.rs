//! Deterministic agents for Taskloom.
//!
//! Each agent answers from its instruction and parameters alone, which makes
//! workflow runs reproducible without an external model.

mod agent;
mod kind;

pub use agent::{StaticAgent, build_pool};
pub use kind::{StaticKind, UnknownKind};
