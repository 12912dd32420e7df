// MedSync - Healthcare Integration Sync Engine
// Copyright (c) 2025 MedSync Contributors
// Licensed under the MIT License

//! # MedSync - Healthcare Integration Sync Engine
//!
//! MedSync keeps a clinic's local records in step with external healthcare
//! providers: national health record, pathology labs, imaging centres,
//! pharmacies and billing services.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Registering** provider integrations with their endpoint and credentials
//! - **Authenticating** with OAuth2 (authorization code + refresh), API keys or
//!   client certificates
//! - **Syncing** provider resources into local records with per-record failure
//!   isolation
//! - **Auditing** every sync attempt in an append-only log
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (registry, vault, OAuth flow, executor, audit)
//! - [`adapters`] - External integrations (HTTP, auth, provider feeds, storage)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medsync::config::load_config;
//! use medsync::core::IntegrationService;
//! use medsync::domain::IntegrationId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("medsync.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let service = IntegrationService::new(config, shutdown_rx).await?;
//!     service.import_configured().await?;
//!
//!     let id = IntegrationId::new("sonic-lab")?;
//!     service.registry().set_active(&id, true).await?;
//!
//!     let result = service.sync(&id).await?;
//!     println!(
//!         "Synced {}/{} records",
//!         result.records_successful, result.records_processed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`domain::MedSyncError`]. Each error maps to
//! an [`domain::ErrorKind`] and a stable machine-readable code that is written
//! to the sync log:
//!
//! ```rust,no_run
//! use medsync::domain::{ErrorKind, MedSyncError};
//!
//! fn describe(err: &MedSyncError) -> String {
//!     match err.kind() {
//!         ErrorKind::Authentication => format!("reauthorize: {}", err.code()),
//!         _ => err.to_string(),
//!     }
//! }
//! ```
//!
//! ## Logging
//!
//! MedSync logs with `tracing`. Secrets never appear in log fields; use
//! [`config::fingerprint`] to correlate a credential across log lines.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
