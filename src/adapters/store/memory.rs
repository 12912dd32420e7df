//! In-process store

use super::document::{DocumentStore, Persistence, StoreDocument};
use crate::domain::Result;
use async_trait::async_trait;

/// Keeps the document in memory only
#[derive(Debug, Default)]
pub struct InMemory;

#[async_trait]
impl Persistence for InMemory {
    async fn save(&self, _document: &StoreDocument) -> Result<()> {
        Ok(())
    }
}

/// Store that lives for the duration of the process
pub type MemoryStore = DocumentStore<InMemory>;

impl MemoryStore {
    pub fn new() -> Self {
        DocumentStore::with_document(StoreDocument::default(), InMemory)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
