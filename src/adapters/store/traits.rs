//! Persistence collaborator traits
//!
//! The sync engine never touches storage internals. Integrations, the sync
//! log and pending OAuth states go through [`IntegrationStore`]; canonical
//! records go through [`RecordSink`].

use crate::domain::ids::{IntegrationId, LogId};
use crate::domain::{
    BillingTransaction, DispensingEvent, ImagingStudy, IntegrationConfig, LogFilter, OAuthState,
    PathologyResult, PatientRecord, Result, SyncLogEntry, SyncLogUpdate,
};
use async_trait::async_trait;

/// Repository for integrations, sync log entries and OAuth states
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn get_integration(&self, id: &IntegrationId) -> Result<Option<IntegrationConfig>>;

    async fn list_integrations(&self, active_only: bool) -> Result<Vec<IntegrationConfig>>;

    async fn upsert_integration(&self, config: &IntegrationConfig) -> Result<()>;

    /// Appends a new sync log entry
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if an entry with the same id exists.
    async fn append_log(&self, entry: &SyncLogEntry) -> Result<()>;

    /// Finalizes an in-progress sync log entry
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if no entry has this id
    /// - `StoreError::LogFinalized` if the entry already left in-progress
    async fn update_log(&self, id: &LogId, update: &SyncLogUpdate) -> Result<()>;

    async fn get_log(&self, id: &LogId) -> Result<Option<SyncLogEntry>>;

    /// Lists entries matching the filter, newest first
    async fn list_logs(&self, filter: &LogFilter) -> Result<Vec<SyncLogEntry>>;

    async fn get_pending_oauth_state(
        &self,
        integration_id: &IntegrationId,
    ) -> Result<Option<OAuthState>>;

    /// Stores a pending state, replacing any earlier one for the integration
    async fn put_oauth_state(&self, state: &OAuthState) -> Result<()>;

    async fn delete_oauth_state(&self, integration_id: &IntegrationId) -> Result<()>;
}

/// Whether an upsert created or replaced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Canonical-record sink
///
/// Every operation upserts by the record's natural key, so replaying the
/// same provider data never creates duplicates.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn upsert_patient(&self, record: &PatientRecord) -> Result<UpsertOutcome>;

    async fn upsert_pathology_result(&self, record: &PathologyResult) -> Result<UpsertOutcome>;

    async fn upsert_imaging_study(&self, record: &ImagingStudy) -> Result<UpsertOutcome>;

    async fn upsert_dispensing_event(&self, record: &DispensingEvent) -> Result<UpsertOutcome>;

    async fn upsert_billing_transaction(
        &self,
        record: &BillingTransaction,
    ) -> Result<UpsertOutcome>;
}
