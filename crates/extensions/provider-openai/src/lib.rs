//! OpenAI-shaped LLM provider for WebRefactor.
//!
//! Also serves OpenAI-compatible endpoints configured as the `custom`
//! provider.

mod api;
mod provider;

pub use provider::{DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE, OpenAIProvider};
