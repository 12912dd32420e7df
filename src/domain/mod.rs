//! Domain models and types for MedSync.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`IntegrationId`], [`LogId`])
//! - **Integration model** ([`IntegrationConfig`], [`Credentials`], [`IntegrationMetrics`])
//! - **Sync outcomes** ([`SyncResult`], [`SyncLogEntry`])
//! - **OAuth handshake state** ([`OAuthState`], [`OAuthPhase`])
//! - **Canonical records** written by the provider strategies
//! - **Error types** ([`MedSyncError`], [`AuthError`], [`ProviderError`], [`StoreError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Credentials are a closed sum type: the variant *is* the auth method, so an
//! integration cannot hold credentials shaped for a different method.
//!
//! ```rust
//! use medsync::config::secret_string;
//! use medsync::domain::{AuthMethod, Credentials};
//!
//! let creds = Credentials::ApiKey {
//!     api_key: Some(secret_string("live-key".to_string())),
//! };
//! assert_eq!(creds.method(), AuthMethod::ApiKey);
//! ```

pub mod credentials;
pub mod errors;
pub mod ids;
pub mod integration;
pub mod oauth;
pub mod records;
pub mod result;
pub mod sync;

// Re-export commonly used types for convenience
pub use credentials::{AuthMethod, Credentials, OAuthCredentials, OAuthTokens};
pub use errors::{AuthError, ErrorKind, MedSyncError, ProviderError, StoreError};
pub use ids::{IntegrationId, LogId};
pub use integration::{
    IntegrationConfig, IntegrationMetrics, IntegrationStatus, IntegrationSummary, IntegrationType,
};
pub use oauth::{OAuthPhase, OAuthState};
pub use records::{
    AbnormalFlag, BillingTransaction, ClaimStatus, DispensingEvent, ImagingStudy,
    PathologyResult, PatientRecord,
};
pub use result::Result;
pub use sync::{LogFilter, SyncLogEntry, SyncLogUpdate, SyncResult, SyncStatus, SyncTally};
