//! Key/value storage for WebRefactor.
//!
//! Two backends of [`KeyValueStore`](webrefactor_protocols::KeyValueStore):
//! [`MemoryStore`] for tests and one-shot runs, [`JsonFileStore`] keeping
//! one JSON document per namespace on disk.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
