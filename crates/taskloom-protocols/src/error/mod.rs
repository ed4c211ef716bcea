//! Error types for the Taskloom protocol layer.

mod agent;

pub use agent::*;
