//! # WebRefactor Runtime
//!
//! The Controller side of the pipeline.
//!
//! - [`Controller`]: refactor, reset, save/apply domain memory, tab lifecycle
//! - [`llm`]: prompt building and the LLM client with its exchange log
//! - [`settings`]: user settings in the synchronized namespace
//! - [`memory`]: per-domain memory in the local namespace
//! - [`tabs`]: per-tab snapshot, last batch and generation tracking

pub mod controller;
pub mod llm;
pub mod memory;
pub mod settings;
pub mod tabs;

pub use controller::{
    Controller, MemoryApplied, ProviderFactory, RefactorOutcome, ReplaySource, check_page_url,
};
pub use llm::{ExchangeLog, LlmClient};
pub use memory::{DomainMemoryStore, RetentionPolicy, memory_hostname};
pub use settings::SettingsStore;
pub use tabs::{LastBatch, TabStates};
