//! Persistence adapters
//!
//! - [`IntegrationStore`] / [`RecordSink`] - the repository interfaces
//! - [`MemoryStore`] - in-process implementation for tests and embedding
//! - [`FileStore`] - JSON document on disk

pub mod document;
pub mod file;
pub mod memory;
pub mod traits;

pub use document::{DocumentStore, RecordCounts, RecordTables, StoreDocument};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{IntegrationStore, RecordSink, UpsertOutcome};
