//! Append-only sync audit log

use crate::adapters::store::IntegrationStore;
use crate::domain::{
    IntegrationId, LogFilter, LogId, MedSyncError, Result, SyncLogEntry, SyncLogUpdate,
    SyncResult,
};
use std::sync::Arc;

/// Operation label recorded for sync attempts
pub const SYNC_OPERATION: &str = "sync";

/// Records every sync attempt
///
/// An entry is appended `in-progress` when a sync starts and finalized
/// exactly once. The store rejects any later modification.
pub struct AuditLog {
    store: Arc<dyn IntegrationStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn IntegrationStore>) -> Self {
        Self { store }
    }

    pub async fn begin(&self, integration_id: &IntegrationId) -> Result<SyncLogEntry> {
        let entry = SyncLogEntry::started(integration_id.clone(), SYNC_OPERATION);
        self.store.append_log(&entry).await?;
        tracing::debug!(integration_id = %integration_id, log_id = %entry.id, "Sync log opened");
        Ok(entry)
    }

    /// Finalizes with the counts and status of a completed run
    pub async fn finalize(&self, log_id: &LogId, result: &SyncResult) -> Result<()> {
        self.store
            .update_log(log_id, &SyncLogUpdate::from_result(result))
            .await
    }

    /// Finalizes as failed with the error's machine-readable code
    pub async fn finalize_error(
        &self,
        log_id: &LogId,
        error: &MedSyncError,
        duration_ms: u64,
    ) -> Result<()> {
        self.store
            .update_log(
                log_id,
                &SyncLogUpdate::failed(error.code(), error.to_string(), duration_ms),
            )
            .await
    }

    pub async fn get(&self, log_id: &LogId) -> Result<Option<SyncLogEntry>> {
        self.store.get_log(log_id).await
    }

    /// Recent entries, newest first
    pub async fn list(&self, filter: &LogFilter) -> Result<Vec<SyncLogEntry>> {
        self.store.list_logs(filter).await
    }
}
