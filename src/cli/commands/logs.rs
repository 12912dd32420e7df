//! Logs command implementation
//!
//! Shows recent sync log entries, newest first.

use super::{open_service, parse_id, report};
use crate::domain::{LogFilter, SyncLogEntry, SyncStatus};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the logs command
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Only entries for this integration
    #[arg(long)]
    pub integration_id: Option<String>,

    /// Only entries with this status (success, failed, warning, in-progress)
    #[arg(long)]
    pub status: Option<SyncStatus>,

    /// Maximum number of entries
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Print entries as JSON
    #[arg(long)]
    pub json: bool,
}

impl LogsArgs {
    /// Execute the logs command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let integration_id = match self.integration_id.as_deref().map(parse_id).transpose() {
            Ok(id) => id,
            Err(code) => return Ok(code),
        };
        let service = match open_service(config_path, shutdown_signal).await {
            Ok(service) => service,
            Err(code) => return Ok(code),
        };

        let filter = LogFilter {
            integration_id,
            status: self.status,
            limit: Some(self.limit),
        };
        let entries = match service.list_logs(&filter).await {
            Ok(entries) => entries,
            Err(e) => return Ok(report(&e)),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(0);
        }

        if entries.is_empty() {
            println!("No sync log entries found");
            return Ok(0);
        }

        println!("📜 Sync log ({} entries)", entries.len());
        println!();
        for entry in &entries {
            print_entry(entry);
        }
        Ok(0)
    }
}

fn print_entry(entry: &SyncLogEntry) {
    println!(
        "{} {} {} [{}] {}/{} ok, {} failed",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        status_icon(entry.status),
        entry.integration_id,
        entry.status,
        entry.records_successful,
        entry.records_processed,
        entry.records_failed
    );
    if let Some(ref code) = entry.error_code {
        println!("    {code}: {}", entry.message.as_deref().unwrap_or(""));
    }
}

fn status_icon(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Success => "✅",
        SyncStatus::Warning => "⚠️ ",
        SyncStatus::Failed => "❌",
        SyncStatus::InProgress => "⏳",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: LogsArgs,
    }

    #[test]
    fn test_logs_args_defaults() {
        let harness = Harness::parse_from(["logs"]);
        assert_eq!(harness.args.limit, 20);
        assert!(harness.args.status.is_none());
    }

    #[test]
    fn test_logs_args_parse_status() {
        let harness = Harness::parse_from(["logs", "--status", "warning", "--limit", "5"]);
        assert_eq!(harness.args.status, Some(SyncStatus::Warning));
        assert_eq!(harness.args.limit, 5);
    }
}
