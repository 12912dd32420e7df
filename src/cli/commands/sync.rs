//! Sync command implementation
//!
//! Runs a sync for one integration, or for every active integration with
//! auto-sync enabled, and prints the results as JSON.

use super::{exit_code, open_service, parse_id, report};
use crate::domain::{MedSyncError, SyncResult};
use clap::Args;
use serde_json::json;
use tokio::sync::watch;

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Integration to sync
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub id: Option<String>,

    /// Sync every active integration with auto-sync enabled
    #[arg(long)]
    pub all: bool,
}

impl SyncArgs {
    /// Execute the sync command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let service = match open_service(config_path, shutdown_signal).await {
            Ok(service) => service,
            Err(code) => return Ok(code),
        };

        if self.all {
            println!("🔄 Syncing all auto-sync integrations");
            let outcomes = match service.sync_all().await {
                Ok(outcomes) => outcomes,
                Err(e) => return Ok(report(&e)),
            };

            let mut code = 0;
            let mut rendered = Vec::with_capacity(outcomes.len());
            for (id, outcome) in &outcomes {
                code = code.max(outcome_code(outcome));
                rendered.push(match outcome {
                    Ok(result) => json!({ "integrationId": id, "result": result }),
                    Err(e) => json!({ "integrationId": id, "error": e.to_string(), "code": e.code() }),
                });
            }
            println!("{}", serde_json::to_string_pretty(&rendered)?);
            return Ok(code);
        }

        let raw = self.id.as_deref().unwrap_or_default();
        let id = match parse_id(raw) {
            Ok(id) => id,
            Err(code) => return Ok(code),
        };

        println!("🔄 Syncing integration: {id}");
        let outcome = service.sync(&id).await;
        match &outcome {
            Ok(result) => {
                println!("{}", serde_json::to_string_pretty(result)?);
                if result.success {
                    println!("✅ Sync completed");
                } else {
                    println!("⚠️  Sync completed with {} failed record(s)", result.records_failed);
                }
            }
            Err(e) => {
                report(e);
            }
        }
        Ok(outcome_code(&outcome))
    }
}

fn outcome_code(outcome: &Result<SyncResult, MedSyncError>) -> i32 {
    match outcome {
        Ok(result) if result.success => 0,
        Ok(_) => 1,
        Err(e) => exit_code(e),
    }
}
