//! Sync outcome and audit log types

use super::ids::{IntegrationId, LogId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of one sync invocation
///
/// Built through [`SyncTally`] or [`SyncResult::listing_failed`], which keep
/// `records_failed = records_processed - records_successful` and
/// `success = (records_failed == 0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub records_processed: u64,
    pub records_successful: u64,
    pub records_failed: u64,
    /// One human-readable message per failed record, in list order
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncResult {
    /// Result of a sync whose top-level listing call failed
    pub fn listing_failed(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            records_processed: 0,
            records_successful: 0,
            records_failed: 0,
            errors: vec![message.into()],
            duration_ms,
        }
    }

    /// Log status this result finalizes to
    ///
    /// A run where some records persisted and some failed is a warning; a run
    /// that persisted nothing and reported errors is a failure.
    pub fn log_status(&self) -> SyncStatus {
        if self.success {
            SyncStatus::Success
        } else if self.records_successful > 0 {
            SyncStatus::Warning
        } else {
            SyncStatus::Failed
        }
    }
}

/// Single-writer aggregator of per-record outcomes
#[derive(Debug, Default)]
pub struct SyncTally {
    processed: u64,
    successful: u64,
    errors: Vec<String>,
}

impl SyncTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.successful += 1;
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.processed += 1;
        self.errors.push(message.into());
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Finishes the tally into a result
    pub fn finish(self, duration_ms: u64) -> SyncResult {
        let records_failed = self.processed - self.successful;
        SyncResult {
            success: records_failed == 0,
            records_processed: self.processed,
            records_successful: self.successful,
            records_failed,
            errors: self.errors,
            duration_ms,
        }
    }
}

/// Status of a sync log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Success,
    Failed,
    InProgress,
    Warning,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
            SyncStatus::InProgress => "in-progress",
            SyncStatus::Warning => "warning",
        };
        f.write_str(s)
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SyncStatus::Success),
            "failed" => Ok(SyncStatus::Failed),
            "in-progress" => Ok(SyncStatus::InProgress),
            "warning" => Ok(SyncStatus::Warning),
            other => Err(format!(
                "Invalid sync status '{other}'. Must be one of: success, failed, in-progress, warning"
            )),
        }
    }
}

/// Persisted record of one sync attempt
///
/// Created with status `in-progress` when a sync starts and finalized once
/// when it ends. Finalized entries are immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub id: LogId,
    pub integration_id: IntegrationId,
    pub operation: String,
    pub status: SyncStatus,
    /// When the attempt started
    pub timestamp: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: u64,
    pub records_successful: u64,
    pub records_failed: u64,
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub duration_ms: Option<u64>,
}

impl SyncLogEntry {
    /// New in-progress entry for an attempt starting now
    pub fn started(integration_id: IntegrationId, operation: impl Into<String>) -> Self {
        Self {
            id: LogId::generate(),
            integration_id,
            operation: operation.into(),
            status: SyncStatus::InProgress,
            timestamp: Utc::now(),
            completed_at: None,
            records_processed: 0,
            records_successful: 0,
            records_failed: 0,
            error_code: None,
            message: None,
            duration_ms: None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == SyncStatus::InProgress
    }

    /// Applies a finalizing update
    pub fn apply(&mut self, update: &SyncLogUpdate) {
        self.status = update.status;
        self.completed_at = Some(update.completed_at);
        self.records_processed = update.records_processed;
        self.records_successful = update.records_successful;
        self.records_failed = update.records_failed;
        self.error_code = update.error_code.clone();
        self.message = update.message.clone();
        self.duration_ms = Some(update.duration_ms);
    }
}

/// Fields written when a sync log entry is finalized
#[derive(Debug, Clone, PartialEq)]
pub struct SyncLogUpdate {
    pub status: SyncStatus,
    pub completed_at: DateTime<Utc>,
    pub records_processed: u64,
    pub records_successful: u64,
    pub records_failed: u64,
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl SyncLogUpdate {
    /// Update mirroring a completed sync result
    pub fn from_result(result: &SyncResult) -> Self {
        let status = result.log_status();
        let error_code = match status {
            SyncStatus::Warning => Some("PARTIAL_FAILURE".to_string()),
            SyncStatus::Failed if result.records_processed == 0 => {
                Some("LISTING_FAILED".to_string())
            }
            SyncStatus::Failed => Some("ALL_RECORDS_FAILED".to_string()),
            _ => None,
        };
        Self {
            status,
            completed_at: Utc::now(),
            records_processed: result.records_processed,
            records_successful: result.records_successful,
            records_failed: result.records_failed,
            error_code,
            message: result.errors.first().cloned(),
            duration_ms: result.duration_ms,
        }
    }

    /// Update for an attempt that ended without a result
    pub fn failed(code: impl Into<String>, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: SyncStatus::Failed,
            completed_at: Utc::now(),
            records_processed: 0,
            records_successful: 0,
            records_failed: 0,
            error_code: Some(code.into()),
            message: Some(message.into()),
            duration_ms,
        }
    }
}

/// Query filter for the sync log
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub integration_id: Option<IntegrationId>,
    pub status: Option<SyncStatus>,
    /// Maximum number of entries, newest first
    pub limit: Option<usize>,
}

impl LogFilter {
    pub fn matches(&self, entry: &SyncLogEntry) -> bool {
        if let Some(ref id) = self.integration_id {
            if &entry.integration_id != id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if entry.status != status {
                return false;
            }
        }
        true
    }
}
