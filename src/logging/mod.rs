//! Logging and observability
//!
//! Structured logging through `tracing`:
//! - console output with an `EnvFilter`
//! - JSON file logging with rotation
//! - helper macros for the sync lifecycle
//!
//! Secrets never appear in log fields; log a
//! [`fingerprint`](crate::config::fingerprint) instead.
//!
//! # Example
//!
//! ```no_run
//! use medsync::logging::init_logging;
//! use medsync::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a sync
///
/// # Example
///
/// ```no_run
/// use medsync::log_sync_start;
/// use medsync::domain::{IntegrationId, IntegrationType};
///
/// let id = IntegrationId::new("sonic-lab").unwrap();
/// log_sync_start!(&id, IntegrationType::Pathology);
/// ```
#[macro_export]
macro_rules! log_sync_start {
    ($integration_id:expr, $integration_type:expr) => {
        tracing::info!(
            integration_id = %$integration_id,
            integration_type = %$integration_type,
            "Starting sync"
        );
    };
}

/// Log the completion of a sync with its counts
///
/// # Example
///
/// ```no_run
/// use medsync::log_sync_complete;
/// use medsync::domain::{IntegrationId, SyncTally};
///
/// let id = IntegrationId::new("sonic-lab").unwrap();
/// let result = SyncTally::new().finish(12);
/// log_sync_complete!(&id, &result);
/// ```
#[macro_export]
macro_rules! log_sync_complete {
    ($integration_id:expr, $result:expr) => {
        tracing::info!(
            integration_id = %$integration_id,
            success = $result.success,
            records_processed = $result.records_processed,
            records_successful = $result.records_successful,
            records_failed = $result.records_failed,
            duration_ms = $result.duration_ms,
            "Sync completed"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use medsync::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying request"
        );
    };
}
