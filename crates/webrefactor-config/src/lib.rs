//! # WebRefactor Config
//!
//! Configuration management for WebRefactor.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, Issue, ValidationResult};
