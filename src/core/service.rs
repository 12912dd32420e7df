//! Integration service - the surface exposed to callers
//!
//! Wires the registry, vault, OAuth flow, audit log and executor over one
//! store and exposes exactly the operations a front end needs.

use super::audit::AuditLog;
use super::executor::SyncExecutor;
use super::oauth::OAuthFlowManager;
use super::registry::IntegrationRegistry;
use super::vault::CredentialVault;
use crate::adapters::auth::AuthAdapter;
use crate::adapters::http::HttpTransport;
use crate::adapters::providers::StrategyRegistry;
use crate::adapters::store::{FileStore, IntegrationStore, RecordSink};
use crate::config::{IntegrationDefinition, MedSyncConfig};
use crate::domain::{IntegrationId, LogFilter, OAuthPhase, Result, SyncLogEntry, SyncResult};
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome of importing configured integration definitions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub created: Vec<IntegrationId>,
    /// Already registered; left untouched
    pub skipped: Vec<IntegrationId>,
}

pub struct IntegrationService {
    config: MedSyncConfig,
    registry: Arc<IntegrationRegistry>,
    vault: Arc<CredentialVault>,
    oauth: Arc<OAuthFlowManager>,
    audit: Arc<AuditLog>,
    auth: Arc<AuthAdapter>,
    executor: SyncExecutor,
}

impl IntegrationService {
    /// Opens the file store at `storage.path` and wires the built-in
    /// strategies
    pub async fn new(config: MedSyncConfig, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let store = Arc::new(FileStore::open(&config.storage.path).await?);
        tracing::debug!(path = %config.storage.path, "Opened integration store");
        Self::with_store(config, store, StrategyRegistry::with_defaults(), shutdown)
    }

    /// Wires the service over an existing store
    pub fn with_store<S>(
        config: MedSyncConfig,
        store: Arc<S>,
        strategies: StrategyRegistry,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self>
    where
        S: IntegrationStore + RecordSink + 'static,
    {
        let integrations: Arc<dyn IntegrationStore> = store.clone();
        let sink: Arc<dyn RecordSink> = store;

        let transport = HttpTransport::new(&config.http)?;
        let registry = Arc::new(IntegrationRegistry::new(integrations.clone()));
        let vault = Arc::new(CredentialVault::new(registry.clone()));
        let audit = Arc::new(AuditLog::new(integrations.clone()));
        let oauth = Arc::new(OAuthFlowManager::new(
            integrations,
            registry.clone(),
            vault.clone(),
            transport.client().clone(),
            config.oauth.clone(),
        ));
        let auth = Arc::new(
            AuthAdapter::new(transport, config.oauth.token_expiry_skew())
                .with_refresher(oauth.clone()),
        );
        let executor = SyncExecutor::new(
            registry.clone(),
            audit.clone(),
            auth.clone(),
            Arc::new(strategies),
            sink,
            &config.sync,
            shutdown,
        );

        Ok(Self {
            config,
            registry,
            vault,
            oauth,
            audit,
            auth,
            executor,
        })
    }

    /// Connectivity probe; never activates the integration
    pub async fn test_connection(&self, id: &IntegrationId) -> Result<bool> {
        self.registry.test_integration(id, &self.auth).await
    }

    pub async fn sync(&self, id: &IntegrationId) -> Result<SyncResult> {
        self.executor.sync(id).await
    }

    pub async fn sync_all(&self) -> Result<Vec<(IntegrationId, Result<SyncResult>)>> {
        self.executor.sync_all().await
    }

    /// Returns the provider authorization URL
    pub async fn begin_oauth(&self, id: &IntegrationId, redirect_uri: Option<&str>) -> Result<String> {
        self.oauth.begin_authorization(id, redirect_uri).await
    }

    pub async fn complete_oauth(&self, id: &IntegrationId, code: &str, state: &str) -> Result<()> {
        self.oauth.complete_authorization(id, code, state).await
    }

    pub fn oauth_phase(&self, id: &IntegrationId) -> OAuthPhase {
        self.oauth.phase(id)
    }

    pub async fn list_logs(&self, filter: &LogFilter) -> Result<Vec<SyncLogEntry>> {
        self.audit.list(filter).await
    }

    pub fn registry(&self) -> &IntegrationRegistry {
        &self.registry
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    /// Registers configured definitions that are not in the store yet
    ///
    /// Existing integrations keep their stored credentials, status and
    /// activation.
    pub async fn import(&self, definitions: &[IntegrationDefinition]) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for definition in definitions {
            let integration = definition.to_integration(&self.config.oauth)?;
            if self.registry.find(&integration.id).await?.is_some() {
                report.skipped.push(integration.id);
                continue;
            }
            let created = self.registry.create(integration).await?;
            report.created.push(created.id);
        }
        tracing::info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            "Imported integration definitions"
        );
        Ok(report)
    }

    /// Imports the definitions of the loaded configuration
    pub async fn import_configured(&self) -> Result<ImportReport> {
        self.import(&self.config.integrations).await
    }
}
