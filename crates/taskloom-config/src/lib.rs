//! # Taskloom Config
//!
//! Configuration management for the Taskloom engine: engine settings,
//! logging, agent bindings and workflow definitions.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
