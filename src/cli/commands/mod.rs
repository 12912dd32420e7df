//! CLI command implementations
//!
//! Every command returns the process exit code:
//!
//! - `0` success
//! - `1` the sync ran but some records failed
//! - `2` configuration error
//! - `3` authentication error
//! - `4` provider unreachable
//! - `5` fatal error

pub mod init;
pub mod integrations;
pub mod logs;
pub mod oauth;
pub mod sync;
pub mod validate;

use crate::config::load_config;
use crate::core::IntegrationService;
use crate::domain::{ErrorKind, IntegrationId, MedSyncError};
use tokio::sync::watch;

/// Maps an error onto the documented exit codes
pub fn exit_code(error: &MedSyncError) -> i32 {
    match error.kind() {
        ErrorKind::Configuration => 2,
        ErrorKind::Authentication => 3,
        ErrorKind::TransientNetwork => 4,
        ErrorKind::PartialRecord | ErrorKind::Concurrency => 1,
        ErrorKind::Storage | ErrorKind::Shutdown => 5,
    }
}

/// Prints the error and returns its exit code
pub(crate) fn report(error: &MedSyncError) -> i32 {
    tracing::error!(error_code = error.code(), error = %error, "Command failed");
    println!("❌ {error}");
    exit_code(error)
}

/// Loads the configuration and opens the service over the configured store
pub(crate) async fn open_service(
    config_path: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<IntegrationService, i32> {
    let config = load_config(config_path).map_err(|e| {
        println!("❌ Failed to load configuration: {e}");
        2
    })?;
    IntegrationService::new(config, shutdown)
        .await
        .map_err(|e| report(&e))
}

pub(crate) fn parse_id(raw: &str) -> Result<IntegrationId, i32> {
    IntegrationId::new(raw).map_err(|e| {
        println!("❌ {e}");
        2
    })
}
