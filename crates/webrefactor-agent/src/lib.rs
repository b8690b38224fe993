//! # WebRefactor Agent
//!
//! The Page Agent: everything that runs against a live document.
//!
//! - [`document`] - parsed HTML with the tree surgery commands need
//! - [`sampler`] - one-pass page fingerprint
//! - [`extractor`] - the page summary handed to the LLM
//! - [`executor`] - applies mutation commands, honouring protection rules
//! - [`agent`] - request handler with sub-batch supervision and rollback
//! - [`host`] - in-process tabs that agents are injected into

pub mod agent;
pub mod document;
pub mod executor;
pub mod extractor;
pub mod host;
pub mod layout;
pub mod protection;
pub mod sampler;
pub mod style;

pub use agent::{AgentSettings, PageAgent};
pub use document::PageDocument;
pub use executor::CommandExecutor;
pub use extractor::extract_summary;
pub use host::LocalBrowser;
pub use protection::ProtectionPolicy;
pub use sampler::sample;
