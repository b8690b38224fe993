//! Anthropic LLM provider for WebRefactor.

mod api;
mod provider;

pub use provider::{API_URL, API_VERSION, AnthropicProvider, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
