//! # Taskloom Protocols
//!
//! Protocol definitions shared by the engine and its external collaborators.
//! Contains only interface definitions - no implementations.
//!
//! ## Core Traits
//!
//! - [`Agent`] - The single capability the engine consumes: execute a role

pub mod agent;
pub mod error;
pub mod types;

pub use agent::{Agent, AgentOutput};
pub use error::AgentError;
pub use types::*;
