//! Error types for the WebRefactor protocol layer.

mod agent;
mod bus;
mod host;
mod provider;
mod refactor;
mod storage;

pub use agent::*;
pub use bus::*;
pub use host::*;
pub use provider::*;
pub use refactor::*;
pub use storage::*;
