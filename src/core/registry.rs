//! Integration registry
//!
//! Single entry point for reading and mutating [`IntegrationConfig`]s. All
//! writes go through [`IntegrationRegistry::update`], which serializes
//! read-modify-write cycles so concurrent callers never lose each other's
//! changes.

use crate::adapters::auth::AuthAdapter;
use crate::adapters::store::IntegrationStore;
use crate::domain::{
    IntegrationConfig, IntegrationId, IntegrationStatus, IntegrationSummary, MedSyncError, Result,
    SyncResult,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// CRUD over integration configurations
pub struct IntegrationRegistry {
    store: Arc<dyn IntegrationStore>,
    write_lock: Mutex<()>,
}

impl IntegrationRegistry {
    pub fn new(store: Arc<dyn IntegrationStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Registers a new integration
    ///
    /// The integration always starts inactive and disconnected, whatever the
    /// caller passed in; activation is a separate, explicit action.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the id is already registered or the
    /// connection facts are invalid.
    pub async fn create(&self, mut config: IntegrationConfig) -> Result<IntegrationConfig> {
        config.validate().map_err(MedSyncError::Configuration)?;

        let _guard = self.write_lock.lock().await;
        if self.store.get_integration(&config.id).await?.is_some() {
            return Err(MedSyncError::Configuration(format!(
                "integration {} already exists",
                config.id
            )));
        }

        let now = Utc::now();
        config.active = false;
        config.status = IntegrationStatus::Disconnected;
        config.created_at = now;
        config.updated_at = now;
        self.store.upsert_integration(&config).await?;

        tracing::info!(
            integration_id = %config.id,
            integration_type = %config.integration_type,
            auth_method = %config.auth_method(),
            "Integration registered"
        );
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `IntegrationNotFound` if the id does not resolve.
    pub async fn get(&self, id: &IntegrationId) -> Result<IntegrationConfig> {
        self.store
            .get_integration(id)
            .await?
            .ok_or_else(|| MedSyncError::IntegrationNotFound(id.to_string()))
    }

    pub async fn find(&self, id: &IntegrationId) -> Result<Option<IntegrationConfig>> {
        self.store.get_integration(id).await
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<IntegrationConfig>> {
        self.store.list_integrations(active_only).await
    }

    /// Client-visible views of every integration
    pub async fn summaries(&self) -> Result<Vec<IntegrationSummary>> {
        Ok(self
            .store
            .list_integrations(false)
            .await?
            .iter()
            .map(IntegrationConfig::summary)
            .collect())
    }

    /// Applies `change` to the stored integration and persists the result
    ///
    /// Nothing is written if `change` fails.
    pub async fn update<F>(&self, id: &IntegrationId, change: F) -> Result<IntegrationConfig>
    where
        F: FnOnce(&mut IntegrationConfig) -> Result<()> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut config = self.get(id).await?;
        change(&mut config)?;
        config.updated_at = Utc::now();
        self.store.upsert_integration(&config).await?;
        Ok(config)
    }

    /// Explicit activation switch
    pub async fn set_active(&self, id: &IntegrationId, active: bool) -> Result<IntegrationConfig> {
        let config = self
            .update(id, |config| {
                config.active = active;
                Ok(())
            })
            .await?;
        tracing::info!(integration_id = %id, active, "Integration activation changed");
        Ok(config)
    }

    /// Soft delete; integrations are never removed so their logs stay
    /// attributable
    pub async fn disable(&self, id: &IntegrationId) -> Result<IntegrationConfig> {
        self.set_active(id, false).await
    }

    pub async fn set_status(
        &self,
        id: &IntegrationId,
        status: IntegrationStatus,
    ) -> Result<IntegrationConfig> {
        self.update(id, |config| {
            config.status = status;
            Ok(())
        })
        .await
    }

    /// Reflects a completed sync into status, `last_sync_at` and metrics
    ///
    /// `last_sync_at` moves on every completion. The incremental cursor moves
    /// to `run_started` only when the run succeeded.
    pub async fn complete_sync(
        &self,
        id: &IntegrationId,
        result: &SyncResult,
        run_started: DateTime<Utc>,
    ) -> Result<IntegrationConfig> {
        self.update(id, |config| {
            config.status = if result.success {
                IntegrationStatus::Connected
            } else {
                IntegrationStatus::Error
            };
            config.last_sync_at = Some(Utc::now());
            if result.success {
                config.sync_cursor = Some(run_started);
            }
            config.metrics.record_sync(result);
            Ok(())
        })
        .await
    }

    /// Reflects a sync that ended with an error instead of a result
    pub async fn fail_sync(
        &self,
        id: &IntegrationId,
        message: impl Into<String> + Send,
    ) -> Result<IntegrationConfig> {
        self.update(id, |config| {
            config.status = IntegrationStatus::Error;
            config.metrics.record_failure(message);
            Ok(())
        })
        .await
    }

    /// Lightweight connectivity probe through the same auth path as syncs
    ///
    /// Issues one authenticated `GET` against the API endpoint. Neither
    /// `active` nor `status` is touched, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationNotFound` if the id does not resolve. Auth and
    /// network failures yield `Ok(false)`.
    pub async fn test_integration(&self, id: &IntegrationId, auth: &AuthAdapter) -> Result<bool> {
        let config = self.get(id).await?;

        let client = match auth.authenticate(&config).await {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(integration_id = %id, error = %e, "Connection test could not authenticate");
                return Ok(false);
            }
        };

        match client.get(&config.api_endpoint).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(integration_id = %id, "Connection test succeeded");
                Ok(true)
            }
            Ok(response) => {
                tracing::warn!(
                    integration_id = %id,
                    status = response.status().as_u16(),
                    "Connection test rejected"
                );
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(integration_id = %id, error = %e, "Connection test failed");
                Ok(false)
            }
        }
    }
}
