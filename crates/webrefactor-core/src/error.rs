//! Errors raised while turning LLM text into commands.

use thiserror::Error;

use crate::parser::Rejection;

/// Why a single action was refused by the command schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("action is not an object")]
    NotAnObject,

    #[error("action has no type")]
    MissingType,

    #[error("unknown command type '{0}'")]
    UnknownType(String),

    #[error("selector is missing or empty")]
    MissingSelector,

    #[error("{command} command requires '{field}'")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    #[error("{command} command has invalid '{field}': {message}")]
    InvalidField {
        command: &'static str,
        field: &'static str,
        message: String,
    },
}

/// Failure to recover a usable batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// No strategy found an object with an `actions` list.
    #[error("No valid JSON format found in response")]
    NoBatch,

    /// A batch was found but every action was rejected.
    #[error("No valid operation commands found ({} rejected)", .rejections.len())]
    NoValidCommands { rejections: Vec<Rejection> },
}

impl ParseError {
    /// Selectors the safety gate refused, in order of appearance.
    pub fn blocked_selectors(&self) -> Vec<String> {
        match self {
            Self::NoBatch => Vec::new(),
            Self::NoValidCommands { rejections } => crate::parser::gate_blocked(rejections),
        }
    }
}
