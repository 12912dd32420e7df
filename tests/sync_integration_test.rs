//! End-to-end sync runs against mock providers

use async_trait::async_trait;
use medsync::adapters::providers::{ProviderSyncStrategy, StrategyRegistry, SyncContext};
use medsync::adapters::store::{IntegrationStore, MemoryStore, RecordSink, UpsertOutcome};
use medsync::config::{secret_string, MedSyncConfig};
use medsync::core::IntegrationService;
use medsync::domain::{
    BillingTransaction, Credentials, DispensingEvent, ImagingStudy, IntegrationConfig,
    IntegrationId, IntegrationStatus, IntegrationType, LogFilter, LogId, MedSyncError, OAuthState,
    PathologyResult, PatientRecord, StoreError, SyncLogEntry, SyncLogUpdate, SyncResult,
    SyncStatus, SyncTally,
};
use mockito::Matcher;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

fn test_config() -> MedSyncConfig {
    let mut config = MedSyncConfig::default();
    config.sync.shutdown_timeout_secs = 0;
    config.sync.retry.initial_delay_ms = 1;
    config.sync.retry.max_delay_ms = 5;
    config
}

fn service(
    store: Arc<MemoryStore>,
    strategies: StrategyRegistry,
) -> (IntegrationService, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    let service = IntegrationService::with_store(test_config(), store, strategies, rx).unwrap();
    (service, tx)
}

async fn register(
    service: &IntegrationService,
    id: &str,
    integration_type: IntegrationType,
    endpoint: &str,
) -> IntegrationId {
    let id = IntegrationId::new(id).unwrap();
    let config = IntegrationConfig::new(
        id.clone(),
        format!("{id} provider"),
        integration_type,
        endpoint,
        Credentials::ApiKey {
            api_key: Some(secret_string("k-123".to_string())),
        },
    );
    service.registry().create(config).await.unwrap();
    service.registry().set_active(&id, true).await.unwrap();
    id
}

fn pathology_result(id: &str, flag: &str) -> Value {
    json!({
        "id": id,
        "patientId": "p-1",
        "testCode": "2823-3",
        "testName": "Potassium",
        "value": "4.2",
        "units": "mmol/L",
        "abnormalFlag": flag,
        "collectedAt": "2025-03-01T08:30:00Z"
    })
}

fn eight_results() -> Value {
    let flags = ["N", "H", "HH", "L", "N", "LL", "A", "N"];
    let results: Vec<Value> = flags
        .iter()
        .enumerate()
        .map(|(i, flag)| pathology_result(&format!("r-{}", i + 1), flag))
        .collect();
    json!({ "results": results })
}

#[tokio::test]
async fn test_pathology_sync_upserts_every_result() {
    let mut server = mockito::Server::new_async().await;
    let listing = server
        .mock("GET", "/results")
        .match_header("authorization", "Bearer k-123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(eight_results().to_string())
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let (service, _tx) = service(store.clone(), StrategyRegistry::with_defaults());
    let id = register(&service, "sonic-lab", IntegrationType::Pathology, &server.url()).await;

    let result = service.sync(&id).await.unwrap();
    listing.assert_async().await;

    assert!(result.success);
    assert_eq!(result.records_processed, 8);
    assert_eq!(result.records_successful, 8);
    assert_eq!(result.records_failed, 0);
    assert_eq!(store.record_counts().await.pathology_results, 8);

    let stored = service.registry().get(&id).await.unwrap();
    assert_eq!(stored.status, IntegrationStatus::Connected);
    assert!(stored.last_sync_at.is_some());
    assert_eq!(stored.metrics.total_records_synced, 8);
    assert_eq!(stored.metrics.sync_count, 1);

    let logs = service.list_logs(&LogFilter::default()).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, SyncStatus::Success);
    assert_eq!(logs[0].records_successful, 8);
    assert!(logs[0].completed_at.is_some());
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let mut server = mockito::Server::new_async().await;
    let listing = server
        .mock("GET", "/results")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(eight_results().to_string())
        .expect(2)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let (service, _tx) = service(store.clone(), StrategyRegistry::with_defaults());
    let id = register(&service, "sonic-lab", IntegrationType::Pathology, &server.url()).await;

    let first = service.sync(&id).await.unwrap();
    let second = service.sync(&id).await.unwrap();
    listing.assert_async().await;

    assert_eq!(first.records_processed, second.records_processed);
    assert_eq!(first.records_successful, second.records_successful);
    assert_eq!(store.record_counts().await.pathology_results, 8);

    let stored = service.registry().get(&id).await.unwrap();
    assert_eq!(stored.metrics.sync_count, 2);
    assert_eq!(stored.metrics.total_records_synced, 16);
}

#[tokio::test]
async fn test_bad_record_is_isolated() {
    let mut bad = pathology_result("r-2", "N");
    bad.as_object_mut().unwrap().remove("testCode");
    let body = json!({
        "results": [pathology_result("r-1", "N"), bad, pathology_result("r-3", "H")]
    });

    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/results")
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let (service, _tx) = service(store.clone(), StrategyRegistry::with_defaults());
    let id = register(&service, "sonic-lab", IntegrationType::Pathology, &server.url()).await;

    let result = service.sync(&id).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.records_processed, 3);
    assert_eq!(result.records_successful, 2);
    assert_eq!(result.records_failed, 1);
    assert_eq!(result.errors, vec!["Record r-2: missing testCode".to_string()]);
    assert_eq!(store.record_counts().await.pathology_results, 2);

    let stored = service.registry().get(&id).await.unwrap();
    assert!(stored.last_sync_at.is_some());
    assert!(stored.sync_cursor.is_none());

    let logs = service.list_logs(&LogFilter::default()).await.unwrap();
    assert_eq!(logs[0].status, SyncStatus::Warning);
    assert_eq!(logs[0].error_code.as_deref(), Some("PARTIAL_FAILURE"));
}

#[tokio::test]
async fn test_rejected_listing_fails_whole_sync() {
    let mut server = mockito::Server::new_async().await;
    let listing = server
        .mock("GET", "/dispensings")
        .with_status(401)
        .with_body(r#"{"error":"invalid_key"}"#)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let (service, _tx) = service(store.clone(), StrategyRegistry::with_defaults());
    let id = register(&service, "chemist", IntegrationType::Pharmacy, &server.url()).await;

    let result = service.sync(&id).await.unwrap();
    listing.assert_async().await;

    assert!(!result.success);
    assert_eq!(result.records_processed, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Pharmacy sync failed: "));
    assert_eq!(store.record_counts().await.dispensing_events, 0);

    let stored = service.registry().get(&id).await.unwrap();
    assert_eq!(stored.status, IntegrationStatus::Error);
    assert!(stored.metrics.last_error.is_some());

    let logs = service.list_logs(&LogFilter::default()).await.unwrap();
    assert_eq!(logs[0].status, SyncStatus::Failed);
    assert_eq!(logs[0].error_code.as_deref(), Some("LISTING_FAILED"));
}

#[tokio::test]
async fn test_transient_listing_failure_is_retried() {
    let mut server = mockito::Server::new_async().await;
    let unavailable = server
        .mock("GET", "/results")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let (service, _tx) = service(store.clone(), StrategyRegistry::with_defaults());
    let id = register(&service, "sonic-lab", IntegrationType::Pathology, &server.url()).await;
    service
        .registry()
        .update(&id, |config| {
            config.retry_attempts = 2;
            Ok(())
        })
        .await
        .unwrap();

    let result = service.sync(&id).await.unwrap();
    unavailable.assert_async().await;
    assert!(!result.success);
    assert!(result.errors[0].starts_with("Pathology sync failed: "));
}

#[tokio::test]
async fn test_failed_listing_does_not_advance_cursor() {
    let mut server = mockito::Server::new_async().await;
    let rejected = server
        .mock("GET", "/dispensings")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let (service, _tx) = service(store.clone(), StrategyRegistry::with_defaults());
    let id = register(&service, "chemist", IntegrationType::Pharmacy, &server.url()).await;

    assert!(!service.sync(&id).await.unwrap().success);
    rejected.assert_async().await;
    rejected.remove_async().await;

    let stored = service.registry().get(&id).await.unwrap();
    assert!(stored.last_sync_at.is_some());
    assert!(stored.sync_cursor.is_none());

    // The retry still lists everything
    let full = server
        .mock("GET", "/dispensings")
        .match_query(Matcher::Regex("^$".to_string()))
        .with_status(200)
        .with_body(r#"{"dispensings":[]}"#)
        .expect(1)
        .create_async()
        .await;
    assert!(service.sync(&id).await.unwrap().success);
    full.assert_async().await;

    let stored = service.registry().get(&id).await.unwrap();
    let cursor = stored.sync_cursor.unwrap();
    assert!(cursor <= stored.last_sync_at.unwrap());

    let incremental = server
        .mock("GET", "/dispensings")
        .match_query(Matcher::Regex("since=".to_string()))
        .with_status(200)
        .with_body(r#"{"dispensings":[]}"#)
        .expect(1)
        .create_async()
        .await;
    assert!(service.sync(&id).await.unwrap().success);
    incremental.assert_async().await;
}

#[tokio::test]
async fn test_inactive_integration_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let (service, _tx) = service(store, StrategyRegistry::with_defaults());
    let id = register(&service, "sonic-lab", IntegrationType::Pathology, "http://127.0.0.1:9").await;
    service.registry().set_active(&id, false).await.unwrap();

    let err = service.sync(&id).await.unwrap_err();
    assert!(matches!(err, MedSyncError::IntegrationInactive(_)));
    assert!(service
        .list_logs(&LogFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_missing_credentials_restore_status() {
    let store = Arc::new(MemoryStore::new());
    let (service, _tx) = service(store, StrategyRegistry::with_defaults());
    let id = IntegrationId::new("sonic-lab").unwrap();
    let config = IntegrationConfig::new(
        id.clone(),
        "Sonic",
        IntegrationType::Pathology,
        "http://127.0.0.1:9",
        Credentials::ApiKey { api_key: None },
    );
    service.registry().create(config).await.unwrap();
    service.registry().set_active(&id, true).await.unwrap();

    let err = service.sync(&id).await.unwrap_err();
    assert_eq!(err.code(), "MISSING_CREDENTIAL");

    let stored = service.registry().get(&id).await.unwrap();
    assert_eq!(stored.status, IntegrationStatus::Disconnected);

    let logs = service.list_logs(&LogFilter::default()).await.unwrap();
    assert_eq!(logs[0].status, SyncStatus::Failed);
    assert_eq!(logs[0].error_code.as_deref(), Some("MISSING_CREDENTIAL"));
}

/// Strategy that parks until released
struct GatedStrategy {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl ProviderSyncStrategy for GatedStrategy {
    fn integration_type(&self) -> IntegrationType {
        IntegrationType::Specialist
    }

    fn label(&self) -> &'static str {
        "Specialist"
    }

    async fn sync(&self, _ctx: &SyncContext<'_>) -> SyncResult {
        self.started.notify_one();
        self.release.notified().await;
        let mut tally = SyncTally::new();
        tally.record_success();
        tally.finish(1)
    }
}

fn gated() -> (StrategyRegistry, Arc<Notify>, Arc<Notify>) {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let strategies = StrategyRegistry::with_defaults().with(GatedStrategy {
        started: started.clone(),
        release: release.clone(),
    });
    (strategies, started, release)
}

#[tokio::test]
async fn test_concurrent_sync_is_rejected() {
    let (strategies, started, release) = gated();
    let store = Arc::new(MemoryStore::new());
    let (service, _tx) = service(store, strategies);
    let service = Arc::new(service);
    let id = register(&service, "cardiology", IntegrationType::Specialist, "http://127.0.0.1:9").await;

    let first = tokio::spawn({
        let service = service.clone();
        let id = id.clone();
        async move { service.sync(&id).await }
    });
    started.notified().await;

    let err = service.sync(&id).await.unwrap_err();
    assert!(matches!(err, MedSyncError::SyncAlreadyInProgress(_)));
    assert_eq!(err.code(), "SYNC_ALREADY_IN_PROGRESS");

    release.notify_one();
    let result = tokio::time::timeout(Duration::from_secs(5), first)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(result.success);

    // Only the run that executed is logged
    let logs = service.list_logs(&LogFilter::default()).await.unwrap();
    assert_eq!(logs.len(), 1);

    // The guard is released once the run ends
    release.notify_one();
    let again = service.sync(&id).await.unwrap();
    assert!(again.success);
}

#[tokio::test]
async fn test_shutdown_aborts_in_flight_sync() {
    let (strategies, started, _release) = gated();
    let store = Arc::new(MemoryStore::new());
    let (service, tx) = service(store, strategies);
    let service = Arc::new(service);
    let id = register(&service, "cardiology", IntegrationType::Specialist, "http://127.0.0.1:9").await;

    let run = tokio::spawn({
        let service = service.clone();
        let id = id.clone();
        async move { service.sync(&id).await }
    });
    started.notified().await;
    tx.send(true).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, Err(MedSyncError::Aborted(_))));

    let logs = service.list_logs(&LogFilter::default()).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, SyncStatus::Failed);
    assert_eq!(logs[0].error_code.as_deref(), Some("ABORTED"));
    assert!(logs[0].duration_ms.is_some());

    let stored = service.registry().get(&id).await.unwrap();
    assert_ne!(stored.status, IntegrationStatus::Syncing);
}

#[tokio::test]
async fn test_sync_all_covers_auto_sync_integrations() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/results")
        .with_status(200)
        .with_body(eight_results().to_string())
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    let (service, _tx) = service(store, StrategyRegistry::with_defaults());
    let auto = register(&service, "sonic-lab", IntegrationType::Pathology, &server.url()).await;
    let manual = register(&service, "qml-lab", IntegrationType::Pathology, &server.url()).await;
    service
        .registry()
        .update(&auto, |config| {
            config.auto_sync = true;
            Ok(())
        })
        .await
        .unwrap();

    let outcomes = service.sync_all().await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].0, auto);
    assert!(outcomes[0].1.as_ref().unwrap().success);

    let untouched = service.registry().get(&manual).await.unwrap();
    assert_eq!(untouched.metrics.sync_count, 0);
}

/// Memory store whose sync log cannot be finalized
struct UnwritableLogStore {
    inner: MemoryStore,
}

#[async_trait]
impl IntegrationStore for UnwritableLogStore {
    async fn get_integration(
        &self,
        id: &IntegrationId,
    ) -> medsync::domain::Result<Option<IntegrationConfig>> {
        self.inner.get_integration(id).await
    }

    async fn list_integrations(
        &self,
        active_only: bool,
    ) -> medsync::domain::Result<Vec<IntegrationConfig>> {
        self.inner.list_integrations(active_only).await
    }

    async fn upsert_integration(&self, config: &IntegrationConfig) -> medsync::domain::Result<()> {
        self.inner.upsert_integration(config).await
    }

    async fn append_log(&self, entry: &SyncLogEntry) -> medsync::domain::Result<()> {
        self.inner.append_log(entry).await
    }

    async fn update_log(&self, id: &LogId, _update: &SyncLogUpdate) -> medsync::domain::Result<()> {
        Err(StoreError::WriteFailed(format!("log {id}: disk full")).into())
    }

    async fn get_log(&self, id: &LogId) -> medsync::domain::Result<Option<SyncLogEntry>> {
        self.inner.get_log(id).await
    }

    async fn list_logs(&self, filter: &LogFilter) -> medsync::domain::Result<Vec<SyncLogEntry>> {
        self.inner.list_logs(filter).await
    }

    async fn get_pending_oauth_state(
        &self,
        integration_id: &IntegrationId,
    ) -> medsync::domain::Result<Option<OAuthState>> {
        self.inner.get_pending_oauth_state(integration_id).await
    }

    async fn put_oauth_state(&self, state: &OAuthState) -> medsync::domain::Result<()> {
        self.inner.put_oauth_state(state).await
    }

    async fn delete_oauth_state(&self, integration_id: &IntegrationId) -> medsync::domain::Result<()> {
        self.inner.delete_oauth_state(integration_id).await
    }
}

#[async_trait]
impl RecordSink for UnwritableLogStore {
    async fn upsert_patient(&self, record: &PatientRecord) -> medsync::domain::Result<UpsertOutcome> {
        self.inner.upsert_patient(record).await
    }

    async fn upsert_pathology_result(
        &self,
        record: &PathologyResult,
    ) -> medsync::domain::Result<UpsertOutcome> {
        self.inner.upsert_pathology_result(record).await
    }

    async fn upsert_imaging_study(
        &self,
        record: &ImagingStudy,
    ) -> medsync::domain::Result<UpsertOutcome> {
        self.inner.upsert_imaging_study(record).await
    }

    async fn upsert_dispensing_event(
        &self,
        record: &DispensingEvent,
    ) -> medsync::domain::Result<UpsertOutcome> {
        self.inner.upsert_dispensing_event(record).await
    }

    async fn upsert_billing_transaction(
        &self,
        record: &BillingTransaction,
    ) -> medsync::domain::Result<UpsertOutcome> {
        self.inner.upsert_billing_transaction(record).await
    }
}

#[tokio::test]
async fn test_log_write_failure_does_not_leave_integration_syncing() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/results")
        .with_status(200)
        .with_body(eight_results().to_string())
        .create_async()
        .await;

    let store = Arc::new(UnwritableLogStore {
        inner: MemoryStore::new(),
    });
    let (_tx, rx) = watch::channel(false);
    let service =
        IntegrationService::with_store(test_config(), store, StrategyRegistry::with_defaults(), rx)
            .unwrap();
    let id = register(&service, "sonic-lab", IntegrationType::Pathology, &server.url()).await;

    let err = service.sync(&id).await.unwrap_err();
    assert!(matches!(err, MedSyncError::Store(StoreError::WriteFailed(_))));

    let stored = service.registry().get(&id).await.unwrap();
    assert_eq!(stored.status, IntegrationStatus::Connected);
    assert_eq!(stored.metrics.sync_count, 1);
}

#[tokio::test]
async fn test_log_write_failure_after_auth_error_restores_status() {
    let store = Arc::new(UnwritableLogStore {
        inner: MemoryStore::new(),
    });
    let (_tx, rx) = watch::channel(false);
    let service = IntegrationService::with_store(
        test_config(),
        store,
        StrategyRegistry::with_defaults(),
        rx,
    )
    .unwrap();

    let id = IntegrationId::new("sonic-lab").unwrap();
    let config = IntegrationConfig::new(
        id.clone(),
        "Sonic Pathology",
        IntegrationType::Pathology,
        "https://lab.example.com",
        Credentials::ApiKey { api_key: None },
    );
    service.registry().create(config).await.unwrap();
    service.registry().set_active(&id, true).await.unwrap();

    let err = service.sync(&id).await.unwrap_err();
    assert_eq!(err.code(), "MISSING_CREDENTIAL");
    assert_eq!(
        service.registry().get(&id).await.unwrap().status,
        IntegrationStatus::Disconnected
    );
}
