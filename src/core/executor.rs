//! Sync executor
//!
//! Runs one sync for one integration:
//!
//! 1. Rejects a second run for an id that is already in flight
//! 2. Resolves the integration and its strategy
//! 3. Marks the integration `syncing` and opens an in-progress log entry
//! 4. Authenticates and runs the strategy, racing the shutdown signal plus
//!    the configured grace period
//! 5. Finalizes the log entry, then reflects the result into the registry
//!
//! The log entry is always finalized before the integration leaves
//! `syncing`, so observers never see a settled status next to a dangling
//! in-progress entry. A failed store write while settling still moves the
//! integration out of `syncing`; the first error is returned.

use super::audit::AuditLog;
use super::registry::IntegrationRegistry;
use crate::adapters::auth::AuthAdapter;
use crate::adapters::http::RetryPolicy;
use crate::adapters::providers::{ProviderSyncStrategy, StrategyRegistry, SyncContext};
use crate::adapters::store::RecordSink;
use crate::config::{RetryConfig, SyncConfig};
use crate::domain::{
    ErrorKind, IntegrationConfig, IntegrationId, IntegrationStatus, MedSyncError, Result,
    SyncResult,
};
use crate::{log_sync_complete, log_sync_start};
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Ids with a sync in flight
type InFlight = Arc<Mutex<HashSet<IntegrationId>>>;

/// Removes the id from the in-flight set when the run ends, however it ends
struct InFlightGuard {
    in_flight: InFlight,
    id: IntegrationId,
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, id: &IntegrationId) -> Result<Self> {
        let mut ids = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(id.clone()) {
            return Err(MedSyncError::SyncAlreadyInProgress(id.to_string()));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            id: id.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        ids.remove(&self.id);
    }
}

/// Orchestrates sync runs
pub struct SyncExecutor {
    registry: Arc<IntegrationRegistry>,
    audit: Arc<AuditLog>,
    auth: Arc<AuthAdapter>,
    strategies: Arc<StrategyRegistry>,
    sink: Arc<dyn RecordSink>,
    backoff: RetryConfig,
    record_timeout: Duration,
    shutdown_grace: Duration,
    in_flight: InFlight,
    shutdown: watch::Receiver<bool>,
}

impl SyncExecutor {
    pub fn new(
        registry: Arc<IntegrationRegistry>,
        audit: Arc<AuditLog>,
        auth: Arc<AuthAdapter>,
        strategies: Arc<StrategyRegistry>,
        sink: Arc<dyn RecordSink>,
        config: &SyncConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            audit,
            auth,
            strategies,
            sink,
            backoff: config.retry.clone(),
            record_timeout: Duration::from_secs(config.record_timeout_seconds),
            shutdown_grace: Duration::from_secs(config.shutdown_timeout_secs),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            shutdown,
        }
    }

    /// Whether a sync for `id` is running right now
    pub fn is_syncing(&self, id: &IntegrationId) -> bool {
        self.in_flight
            .lock()
            .map(|ids| ids.contains(id))
            .unwrap_or(false)
    }

    /// Runs one sync for `id`
    ///
    /// Returns the [`SyncResult`] whenever the strategy ran, including
    /// unsuccessful ones.
    ///
    /// # Errors
    ///
    /// - `SyncAlreadyInProgress` if a sync for `id` is in flight
    /// - `IntegrationNotFound`, `IntegrationInactive`, or a configuration
    ///   error if no strategy is registered for the integration type
    /// - authentication errors from the auth adapter; the integration status
    ///   is restored, not set to `error`
    /// - `Aborted` if shutdown was signalled and the run did not finish
    ///   within the grace period; the log entry is finalized as failed with
    ///   code `ABORTED`
    /// - a storage error if the completed run could not be recorded
    pub async fn sync(&self, id: &IntegrationId) -> Result<SyncResult> {
        let _guard = InFlightGuard::acquire(&self.in_flight, id)?;

        if *self.shutdown.borrow() {
            return Err(MedSyncError::Aborted(
                "shutdown in progress, sync not started".to_string(),
            ));
        }

        let config = self.registry.get(id).await?;
        if !config.active {
            return Err(MedSyncError::IntegrationInactive(id.to_string()));
        }
        let strategy = self.strategies.get(config.integration_type).ok_or_else(|| {
            MedSyncError::Configuration(format!(
                "no sync strategy registered for integration type {}",
                config.integration_type
            ))
        })?;

        let previous_status = config.status;
        self.registry
            .set_status(id, IntegrationStatus::Syncing)
            .await?;
        let entry = match self.audit.begin(id).await {
            Ok(entry) => entry,
            Err(e) => {
                self.registry.set_status(id, previous_status).await?;
                return Err(e);
            }
        };

        log_sync_start!(id, config.integration_type);
        let run_started = Utc::now();
        let started = Instant::now();

        let mut shutdown = self.shutdown.clone();
        let outcome = tokio::select! {
            outcome = self.run(&config, strategy.as_ref()) => outcome,
            _ = async {
                shutdown_signalled(&mut shutdown).await;
                tracing::warn!(
                    integration_id = %id,
                    grace_secs = self.shutdown_grace.as_secs(),
                    "Shutdown signalled, waiting for in-flight sync"
                );
                tokio::time::sleep(self.shutdown_grace).await;
            } => Err(MedSyncError::Aborted(format!(
                "shutdown signalled during sync of {id}"
            ))),
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(result) => {
                let finalized = self.audit.finalize(&entry.id, &result).await;
                let settled = match self.registry.complete_sync(id, &result, run_started).await {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        self.release(id, previous_status).await;
                        Err(e)
                    }
                };
                finalized.and(settled)?;
                log_sync_complete!(id, result);
                Ok(result)
            }
            Err(e) => {
                if let Err(store_error) = self.audit.finalize_error(&entry.id, &e, elapsed_ms).await
                {
                    tracing::error!(
                        integration_id = %id,
                        log_id = %entry.id,
                        error = %store_error,
                        "Sync log entry could not be finalized"
                    );
                }
                let settled = match e.kind() {
                    ErrorKind::Authentication | ErrorKind::Shutdown => {
                        self.registry.set_status(id, previous_status).await
                    }
                    _ => self.registry.fail_sync(id, e.to_string()).await,
                };
                if settled.is_err() {
                    self.release(id, previous_status).await;
                }
                tracing::error!(
                    integration_id = %id,
                    error_code = e.code(),
                    error = %e,
                    duration_ms = elapsed_ms,
                    "Sync did not complete"
                );
                Err(e)
            }
        }
    }

    /// Last attempt to move the integration out of `syncing` after a store
    /// write failed
    async fn release(&self, id: &IntegrationId, previous_status: IntegrationStatus) {
        if let Err(e) = self.registry.set_status(id, previous_status).await {
            tracing::error!(
                integration_id = %id,
                error = %e,
                "Integration status could not be restored after sync"
            );
        }
    }

    /// Syncs every active integration with auto-sync enabled, concurrently
    ///
    /// Each integration still gets at most one run in flight.
    pub async fn sync_all(&self) -> Result<Vec<(IntegrationId, Result<SyncResult>)>> {
        let ids: Vec<IntegrationId> = self
            .registry
            .list(true)
            .await?
            .into_iter()
            .filter(|config| config.auto_sync)
            .map(|config| config.id)
            .collect();

        tracing::info!(integrations = ids.len(), "Starting scheduled sync");

        let runs = ids.into_iter().map(|id| async move {
            let outcome = self.sync(&id).await;
            (id, outcome)
        });
        Ok(join_all(runs).await)
    }

    async fn run(
        &self,
        config: &IntegrationConfig,
        strategy: &dyn ProviderSyncStrategy,
    ) -> Result<SyncResult> {
        let client = self.auth.authenticate(config).await?;
        let ctx = SyncContext {
            integration: config,
            client,
            sink: self.sink.as_ref(),
            retry: RetryPolicy::new(&self.backoff, config.retry_attempts),
            record_timeout: self.record_timeout,
        };
        Ok(strategy.sync(&ctx).await)
    }
}

/// Resolves once shutdown is signalled; never if the sender is gone
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
