//! LLM client: prompt construction, transport and the exchange log.

mod client;
mod log;
pub mod prompt;

pub use client::{LlmClient, DEFAULT_TEMPERATURE};
pub use log::{ExchangeLog, MAX_LOG_ENTRIES};
