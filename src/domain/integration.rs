//! Integration domain model
//!
//! An integration is one configured connection to an external healthcare
//! data provider. [`IntegrationConfig`] is the only persisted entity besides
//! the sync log.

use super::credentials::{AuthMethod, Credentials};
use super::ids::IntegrationId;
use super::sync::SyncResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weight given to the latest run in the smoothed success rate
const SUCCESS_RATE_WEIGHT: f64 = 0.2;

/// Kind of external system an integration talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationType {
    /// National health record system (FHIR)
    HealthRecord,
    /// Pathology laboratory result feed
    Pathology,
    /// Imaging network study list
    Imaging,
    /// Pharmacy dispensing feed
    Pharmacy,
    /// Billing / claims system
    Billing,
    /// Specialist referral network
    Specialist,
}

impl IntegrationType {
    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationType::HealthRecord => "health-record",
            IntegrationType::Pathology => "pathology",
            IntegrationType::Imaging => "imaging",
            IntegrationType::Pharmacy => "pharmacy",
            IntegrationType::Billing => "billing",
            IntegrationType::Specialist => "specialist",
        }
    }
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "health-record" => Ok(IntegrationType::HealthRecord),
            "pathology" => Ok(IntegrationType::Pathology),
            "imaging" => Ok(IntegrationType::Imaging),
            "pharmacy" => Ok(IntegrationType::Pharmacy),
            "billing" => Ok(IntegrationType::Billing),
            "specialist" => Ok(IntegrationType::Specialist),
            other => Err(format!(
                "Invalid integration type '{other}'. Must be one of: health-record, pathology, imaging, pharmacy, billing, specialist"
            )),
        }
    }
}

/// Connection status shown for an integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationStatus {
    #[default]
    Disconnected,
    Connected,
    Syncing,
    Error,
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntegrationStatus::Disconnected => "disconnected",
            IntegrationStatus::Connected => "connected",
            IntegrationStatus::Syncing => "syncing",
            IntegrationStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Running health metrics for one integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationMetrics {
    /// Sum of `records_processed` over all completed syncs
    pub total_records_synced: u64,

    /// Number of completed syncs
    pub sync_count: u64,

    /// Smoothed success rate in `[0, 100]`
    pub success_rate: f64,

    /// Message of the most recent failure
    pub last_error: Option<String>,
}

impl Default for IntegrationMetrics {
    fn default() -> Self {
        Self {
            total_records_synced: 0,
            sync_count: 0,
            success_rate: 100.0,
            last_error: None,
        }
    }
}

impl IntegrationMetrics {
    /// Folds one completed sync into the running metrics
    ///
    /// The success rate is an exponential moving average pulled toward 100 on
    /// success and toward 0 on failure, so it never drops on a successful run,
    /// never rises on a failed one, and stays within `[0, 100]`.
    pub fn record_sync(&mut self, result: &SyncResult) {
        self.total_records_synced += result.records_processed;
        self.sync_count += 1;

        let target = if result.success { 100.0 } else { 0.0 };
        let next = self.success_rate + SUCCESS_RATE_WEIGHT * (target - self.success_rate);
        self.success_rate = next.clamp(0.0, 100.0);

        if !result.success {
            self.last_error = result.errors.first().cloned();
        }
    }

    /// Records a sync that ended with an error instead of a result
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.sync_count += 1;
        let next = self.success_rate * (1.0 - SUCCESS_RATE_WEIGHT);
        self.success_rate = next.clamp(0.0, 100.0);
        self.last_error = Some(message.into());
    }
}

/// Identity and connection facts for one external system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub id: IntegrationId,

    pub name: String,

    #[serde(rename = "type")]
    pub integration_type: IntegrationType,

    /// Provider API base URL
    pub api_endpoint: String,

    pub credentials: Credentials,

    /// Data flows only for active integrations; activation is explicit
    pub active: bool,

    /// Included in scheduled `sync_all` runs
    pub auto_sync: bool,

    /// Retries for transient failures before counting them as failures
    pub retry_attempts: u32,

    pub last_sync_at: Option<DateTime<Utc>>,

    /// Start time of the last run that listed and persisted every record;
    /// the `since` sent on the next incremental listing
    #[serde(default)]
    pub sync_cursor: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status: IntegrationStatus,

    #[serde(default)]
    pub metrics: IntegrationMetrics,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl IntegrationConfig {
    /// Creates a new, inactive and disconnected integration
    pub fn new(
        id: IntegrationId,
        name: impl Into<String>,
        integration_type: IntegrationType,
        api_endpoint: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            integration_type,
            api_endpoint: api_endpoint.into(),
            credentials,
            active: false,
            auto_sync: false,
            retry_attempts: 3,
            last_sync_at: None,
            sync_cursor: None,
            status: IntegrationStatus::Disconnected,
            metrics: IntegrationMetrics::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The auth method this integration authenticates with
    pub fn auth_method(&self) -> AuthMethod {
        self.credentials.method()
    }

    /// Validates the connection facts
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!("integration {}: name cannot be empty", self.id));
        }
        if !self.api_endpoint.starts_with("http://") && !self.api_endpoint.starts_with("https://")
        {
            return Err(format!(
                "integration {}: api_endpoint must start with http:// or https://",
                self.id
            ));
        }
        if self.retry_attempts > 10 {
            return Err(format!(
                "integration {}: retry_attempts must be <= 10, got {}",
                self.id, self.retry_attempts
            ));
        }
        Ok(())
    }

    /// Client-visible view without credentials
    pub fn summary(&self) -> IntegrationSummary {
        IntegrationSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            integration_type: self.integration_type,
            api_endpoint: self.api_endpoint.clone(),
            auth_method: self.auth_method(),
            active: self.active,
            auto_sync: self.auto_sync,
            status: self.status,
            last_sync_at: self.last_sync_at,
            metrics: self.metrics.clone(),
        }
    }
}

/// Integration view safe to hand to the UI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSummary {
    pub id: IntegrationId,
    pub name: String,
    #[serde(rename = "type")]
    pub integration_type: IntegrationType,
    pub api_endpoint: String,
    pub auth_method: AuthMethod,
    pub active: bool,
    pub auto_sync: bool,
    pub status: IntegrationStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub metrics: IntegrationMetrics,
}
