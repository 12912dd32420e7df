//! Document-backed store shared by the memory and file backends
//!
//! The whole store is one serializable [`StoreDocument`]. Mutations run
//! against a copy under a lock and only replace the live document once the
//! backend has saved it, so a failed write leaves the store unchanged.

use super::traits::{IntegrationStore, RecordSink, UpsertOutcome};
use crate::domain::ids::{IntegrationId, LogId};
use crate::domain::{
    BillingTransaction, DispensingEvent, ImagingStudy, IntegrationConfig, LogFilter, OAuthState,
    PathologyResult, PatientRecord, Result, StoreError, SyncLogEntry, SyncLogUpdate,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Canonical record tables keyed by natural key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordTables {
    #[serde(default)]
    pub patients: BTreeMap<String, PatientRecord>,
    #[serde(default)]
    pub pathology_results: BTreeMap<String, PathologyResult>,
    #[serde(default)]
    pub imaging_studies: BTreeMap<String, ImagingStudy>,
    #[serde(default)]
    pub dispensing_events: BTreeMap<String, DispensingEvent>,
    #[serde(default)]
    pub billing_transactions: BTreeMap<String, BillingTransaction>,
}

/// Number of stored records per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub patients: usize,
    pub pathology_results: usize,
    pub imaging_studies: usize,
    pub dispensing_events: usize,
    pub billing_transactions: usize,
}

/// Everything the store holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub integrations: BTreeMap<IntegrationId, IntegrationConfig>,
    /// Sync log in append order
    #[serde(default)]
    pub sync_logs: Vec<SyncLogEntry>,
    #[serde(default)]
    pub oauth_states: BTreeMap<IntegrationId, OAuthState>,
    #[serde(default)]
    pub records: RecordTables,
}

impl StoreDocument {
    fn append_log(&mut self, entry: &SyncLogEntry) -> Result<()> {
        if self.sync_logs.iter().any(|e| e.id == entry.id) {
            return Err(StoreError::Conflict(format!("sync log entry {}", entry.id)).into());
        }
        self.sync_logs.push(entry.clone());
        Ok(())
    }

    fn update_log(&mut self, id: &LogId, update: &SyncLogUpdate) -> Result<()> {
        let entry = self
            .sync_logs
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("sync log entry {id}")))?;
        if !entry.is_in_progress() {
            return Err(StoreError::LogFinalized(id.to_string()).into());
        }
        entry.apply(update);
        Ok(())
    }

    fn list_logs(&self, filter: &LogFilter) -> Vec<SyncLogEntry> {
        let matching = self
            .sync_logs
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned();
        match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    pub fn record_counts(&self) -> RecordCounts {
        RecordCounts {
            patients: self.records.patients.len(),
            pathology_results: self.records.pathology_results.len(),
            imaging_studies: self.records.imaging_studies.len(),
            dispensing_events: self.records.dispensing_events.len(),
            billing_transactions: self.records.billing_transactions.len(),
        }
    }
}

fn upsert<T: Clone>(table: &mut BTreeMap<String, T>, key: String, record: &T) -> UpsertOutcome {
    match table.insert(key, record.clone()) {
        Some(_) => UpsertOutcome::Updated,
        None => UpsertOutcome::Inserted,
    }
}

/// Where a [`DocumentStore`] keeps its document between mutations
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Durably saves the document
    async fn save(&self, document: &StoreDocument) -> Result<()>;
}

/// Store over one [`StoreDocument`] and a persistence backend
pub struct DocumentStore<P> {
    document: Mutex<StoreDocument>,
    persistence: P,
}

impl<P: Persistence> DocumentStore<P> {
    pub(crate) fn with_document(document: StoreDocument, persistence: P) -> Self {
        Self {
            document: Mutex::new(document),
            persistence,
        }
    }

    async fn read<R>(&self, f: impl FnOnce(&StoreDocument) -> R) -> R {
        let document = self.document.lock().await;
        f(&document)
    }

    async fn mutate<R>(&self, f: impl FnOnce(&mut StoreDocument) -> Result<R>) -> Result<R> {
        let mut document = self.document.lock().await;
        let mut next = document.clone();
        let outcome = f(&mut next)?;
        self.persistence.save(&next).await?;
        *document = next;
        Ok(outcome)
    }

    /// Current number of canonical records per table
    pub async fn record_counts(&self) -> RecordCounts {
        self.read(StoreDocument::record_counts).await
    }

    /// Snapshot of the stored canonical records
    pub async fn records(&self) -> RecordTables {
        self.read(|d| d.records.clone()).await
    }
}

#[async_trait]
impl<P: Persistence> IntegrationStore for DocumentStore<P> {
    async fn get_integration(&self, id: &IntegrationId) -> Result<Option<IntegrationConfig>> {
        Ok(self.read(|d| d.integrations.get(id).cloned()).await)
    }

    async fn list_integrations(&self, active_only: bool) -> Result<Vec<IntegrationConfig>> {
        Ok(self
            .read(|d| {
                d.integrations
                    .values()
                    .filter(|i| !active_only || i.active)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn upsert_integration(&self, config: &IntegrationConfig) -> Result<()> {
        self.mutate(|d| {
            d.integrations.insert(config.id.clone(), config.clone());
            Ok(())
        })
        .await
    }

    async fn append_log(&self, entry: &SyncLogEntry) -> Result<()> {
        self.mutate(|d| d.append_log(entry)).await
    }

    async fn update_log(&self, id: &LogId, update: &SyncLogUpdate) -> Result<()> {
        self.mutate(|d| d.update_log(id, update)).await
    }

    async fn get_log(&self, id: &LogId) -> Result<Option<SyncLogEntry>> {
        Ok(self
            .read(|d| d.sync_logs.iter().find(|e| &e.id == id).cloned())
            .await)
    }

    async fn list_logs(&self, filter: &LogFilter) -> Result<Vec<SyncLogEntry>> {
        Ok(self.read(|d| d.list_logs(filter)).await)
    }

    async fn get_pending_oauth_state(
        &self,
        integration_id: &IntegrationId,
    ) -> Result<Option<OAuthState>> {
        Ok(self
            .read(|d| d.oauth_states.get(integration_id).cloned())
            .await)
    }

    async fn put_oauth_state(&self, state: &OAuthState) -> Result<()> {
        self.mutate(|d| {
            d.oauth_states
                .insert(state.integration_id.clone(), state.clone());
            Ok(())
        })
        .await
    }

    async fn delete_oauth_state(&self, integration_id: &IntegrationId) -> Result<()> {
        self.mutate(|d| {
            d.oauth_states.remove(integration_id);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl<P: Persistence> RecordSink for DocumentStore<P> {
    async fn upsert_patient(&self, record: &PatientRecord) -> Result<UpsertOutcome> {
        self.mutate(|d| {
            Ok(upsert(
                &mut d.records.patients,
                record.natural_key(),
                record,
            ))
        })
        .await
    }

    async fn upsert_pathology_result(&self, record: &PathologyResult) -> Result<UpsertOutcome> {
        self.mutate(|d| {
            Ok(upsert(
                &mut d.records.pathology_results,
                record.natural_key(),
                record,
            ))
        })
        .await
    }

    async fn upsert_imaging_study(&self, record: &ImagingStudy) -> Result<UpsertOutcome> {
        self.mutate(|d| {
            Ok(upsert(
                &mut d.records.imaging_studies,
                record.natural_key(),
                record,
            ))
        })
        .await
    }

    async fn upsert_dispensing_event(&self, record: &DispensingEvent) -> Result<UpsertOutcome> {
        self.mutate(|d| {
            Ok(upsert(
                &mut d.records.dispensing_events,
                record.natural_key(),
                record,
            ))
        })
        .await
    }

    async fn upsert_billing_transaction(
        &self,
        record: &BillingTransaction,
    ) -> Result<UpsertOutcome> {
        self.mutate(|d| {
            Ok(upsert(
                &mut d.records.billing_transactions,
                record.natural_key(),
                record,
            ))
        })
        .await
    }
}
