//! Core business logic for MedSync.
//!
//! # Modules
//!
//! - [`registry`] - CRUD over integration configurations, connection tests
//! - [`vault`] - per-integration secrets
//! - [`oauth`] - OAuth2 authorization-code flow and token refresh
//! - [`audit`] - append-only sync log
//! - [`executor`] - one sync run per integration at a time
//! - [`service`] - the caller-facing surface wiring all of the above
//!
//! # Sync Workflow
//!
//! 1. **Resolve**: look up the integration and the strategy for its type
//! 2. **Open log**: mark the integration `syncing`, append an in-progress entry
//! 3. **Authenticate**: build a client through the auth adapter
//! 4. **Fetch and upsert**: the strategy lists provider resources and upserts
//!    each one, isolating per-record failures
//! 5. **Finalize**: close the log entry, then update status and metrics
//!
//! # Example
//!
//! ```rust,no_run
//! use medsync::config::load_config;
//! use medsync::core::IntegrationService;
//! use medsync::domain::IntegrationId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("medsync.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let service = IntegrationService::new(config, shutdown_rx).await?;
//! let result = service.sync(&IntegrationId::new("sonic-lab")?).await?;
//!
//! println!("Processed: {}", result.records_processed);
//! println!("Failed: {}", result.records_failed);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod executor;
pub mod oauth;
pub mod registry;
pub mod service;
pub mod vault;

pub use audit::AuditLog;
pub use executor::SyncExecutor;
pub use oauth::OAuthFlowManager;
pub use registry::IntegrationRegistry;
pub use service::{ImportReport, IntegrationService};
pub use vault::CredentialVault;
