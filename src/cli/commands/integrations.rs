//! Integrations command implementation
//!
//! Lists registered integrations, imports definitions from the config
//! file, and toggles activation.

use super::{open_service, parse_id, report};
use crate::domain::{IntegrationStatus, IntegrationSummary};
use clap::{Args, Subcommand};
use tokio::sync::watch;

/// Arguments for the integrations command
#[derive(Args, Debug)]
pub struct IntegrationsArgs {
    #[command(subcommand)]
    pub command: IntegrationsCommand,
}

#[derive(Subcommand, Debug)]
pub enum IntegrationsCommand {
    /// List registered integrations with status and metrics
    List {
        /// Print summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register the `[[integrations]]` defined in the config file
    Import,

    /// Enable syncing for an integration
    Activate { id: String },

    /// Disable syncing for an integration
    Deactivate { id: String },
}

impl IntegrationsArgs {
    /// Execute the integrations command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let service = match open_service(config_path, shutdown_signal).await {
            Ok(service) => service,
            Err(code) => return Ok(code),
        };

        match &self.command {
            IntegrationsCommand::List { json } => {
                let summaries = match service.registry().summaries().await {
                    Ok(summaries) => summaries,
                    Err(e) => return Ok(report(&e)),
                };
                if *json {
                    println!("{}", serde_json::to_string_pretty(&summaries)?);
                } else if summaries.is_empty() {
                    println!("No integrations registered");
                    println!("   Define [[integrations]] in the config file and run: medsync integrations import");
                } else {
                    println!("📋 Integrations");
                    println!();
                    for summary in &summaries {
                        print_summary(summary);
                    }
                }
                Ok(0)
            }
            IntegrationsCommand::Import => match service.import_configured().await {
                Ok(imported) => {
                    for id in &imported.created {
                        println!("✅ Registered {id} (inactive until activated)");
                    }
                    for id in &imported.skipped {
                        println!("⏭️  Skipped {id} (already registered)");
                    }
                    println!();
                    println!(
                        "Imported {} integration(s), skipped {}",
                        imported.created.len(),
                        imported.skipped.len()
                    );
                    Ok(0)
                }
                Err(e) => Ok(report(&e)),
            },
            IntegrationsCommand::Activate { id } | IntegrationsCommand::Deactivate { id } => {
                let active = matches!(self.command, IntegrationsCommand::Activate { .. });
                let id = match parse_id(id) {
                    Ok(id) => id,
                    Err(code) => return Ok(code),
                };
                match service.registry().set_active(&id, active).await {
                    Ok(_) => {
                        let verb = if active { "activated" } else { "deactivated" };
                        println!("✅ Integration {id} {verb}");
                        Ok(0)
                    }
                    Err(e) => Ok(report(&e)),
                }
            }
        }
    }
}

fn print_summary(summary: &IntegrationSummary) {
    let icon = match summary.status {
        IntegrationStatus::Connected => "🟢",
        IntegrationStatus::Syncing => "🔄",
        IntegrationStatus::Error => "🔴",
        IntegrationStatus::Disconnected => "⚪",
    };
    println!(
        "{icon} {} ({}) [{}] {}",
        summary.id,
        summary.integration_type,
        summary.status,
        if summary.active { "active" } else { "inactive" }
    );
    println!("    Name: {}", summary.name);
    println!("    Endpoint: {}", summary.api_endpoint);
    println!("    Auth: {}", summary.auth_method);
    match summary.last_sync_at {
        Some(at) => println!("    Last sync: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("    Last sync: never"),
    }
    println!(
        "    Synced: {} records over {} run(s), success rate {:.1}%",
        summary.metrics.total_records_synced,
        summary.metrics.sync_count,
        summary.metrics.success_rate
    );
    if let Some(ref error) = summary.metrics.last_error {
        println!("    Last error: {error}");
    }
}
