//! # WebRefactor Core
//!
//! The pure half of the pipeline. Nothing in here touches a page, the
//! network or storage:
//!
//! - [`schema`] - turns loosely-typed actions into [`MutationCommand`]s
//! - [`gate`] - rejects selectors that would match the whole document
//! - [`parser`] - recovers a command batch from raw LLM text
//! - [`detector`] - decides whether a fingerprint transition is a white page
//!
//! [`MutationCommand`]: webrefactor_protocols::MutationCommand

pub mod detector;
pub mod error;
pub mod gate;
pub mod parser;
pub mod repair;
pub mod schema;

pub use detector::{Verdict, WhitePageDetector};
pub use error::{ParseError, SchemaViolation};
pub use gate::{GateRule, SafetyGate};
pub use parser::{ParsedBatch, Rejection, RejectionReason, ResponseParser};
