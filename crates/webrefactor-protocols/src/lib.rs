//! # WebRefactor Protocols
//!
//! Shared definitions for the refactor pipeline. Contains only data types,
//! message shapes and interface traits - no implementations.
//!
//! ## Core Traits
//!
//! - [`LLMProvider`] - Trait for LLM transport implementations
//! - [`KeyValueStore`] - Trait for the two-namespace settings/memory store
//! - [`PageChannel`] - Trait for the Controller → Page Agent message bus
//! - [`TabHost`] - Trait for the environment that owns tabs and injects agents

pub mod channel;
pub mod command;
pub mod error;
pub mod host;
pub mod memory;
pub mod message;
pub mod page;
pub mod provider;
pub mod retry;
pub mod storage;

pub use channel::PageChannel;
pub use command::{CommandAction, MovePosition, MutationBatch, MutationCommand};
pub use error::{
    AgentError, BusError, HostError, ProviderError, RefactorError, RefactorErrorKind,
    StorageError,
};
pub use host::{TabHost, TabId};
pub use memory::{DomainMemoryEntry, HistoryEntry, MemoryVersion};
pub use message::{AgentFailure, AgentReply, AgentRequest, AgentResponse};
pub use page::{DetectorThresholds, OriginalStateSnapshot, PageFingerprint, PageSummary};
pub use provider::{ChatMessage, CompletionRequest, CompletionResponse, LLMProvider, Role};
pub use retry::{DamageSignal, DamageSignature, RetryContext, RollbackOutcome};
pub use storage::{KeyValueStore, StorageArea};
