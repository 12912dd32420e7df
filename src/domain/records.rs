//! Canonical records
//!
//! Provider-agnostic representations of the clinical and financial facts the
//! portal stores. Every record carries the integration it came from and the
//! provider's own record id; together they form the natural key the record
//! sink upserts on.

use super::ids::IntegrationId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Builds the natural key for a provider record
pub fn natural_key(integration_id: &IntegrationId, provider_record_id: &str) -> String {
    format!("{}:{}", integration_id.as_str(), provider_record_id)
}

macro_rules! impl_natural_key {
    ($($record:ty),+ $(,)?) => {
        $(
            impl $record {
                /// Upsert key: `<integration id>:<provider record id>`
                pub fn natural_key(&self) -> String {
                    natural_key(&self.integration_id, &self.provider_record_id)
                }
            }
        )+
    };
}

/// Patient demographics from a national health record system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub integration_id: IntegrationId,
    pub provider_record_id: String,
    /// Individual Healthcare Identifier
    pub ihi: Option<String>,
    pub family_name: String,
    pub given_names: Vec<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
}

/// HL7 v2 abnormal flag (table 0078 subset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbnormalFlag {
    Normal,
    Low,
    High,
    CriticalLow,
    CriticalHigh,
    Abnormal,
    CriticalAbnormal,
}

impl AbnormalFlag {
    /// Parses an HL7 abnormal flag code; an absent or empty code is normal
    pub fn from_hl7(code: Option<&str>) -> Result<Self, String> {
        match code.map(str::trim) {
            None | Some("") | Some("N") => Ok(AbnormalFlag::Normal),
            Some("L") => Ok(AbnormalFlag::Low),
            Some("H") => Ok(AbnormalFlag::High),
            Some("LL") => Ok(AbnormalFlag::CriticalLow),
            Some("HH") => Ok(AbnormalFlag::CriticalHigh),
            Some("A") => Ok(AbnormalFlag::Abnormal),
            Some("AA") => Ok(AbnormalFlag::CriticalAbnormal),
            Some(other) => Err(format!("unknown abnormal flag '{other}'")),
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            AbnormalFlag::CriticalLow | AbnormalFlag::CriticalHigh | AbnormalFlag::CriticalAbnormal
        )
    }
}

/// One pathology test result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathologyResult {
    pub integration_id: IntegrationId,
    pub provider_record_id: String,
    pub patient_id: String,
    /// LOINC code
    pub test_code: String,
    pub test_name: String,
    pub value: String,
    pub units: Option<String>,
    pub reference_range: Option<String>,
    pub flag: AbnormalFlag,
    pub status: String,
    pub collected_at: Option<DateTime<Utc>>,
    pub reported_at: Option<DateTime<Utc>>,
}

/// One imaging study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagingStudy {
    pub integration_id: IntegrationId,
    /// DICOM Study Instance UID
    pub provider_record_id: String,
    pub patient_id: String,
    pub modality: String,
    pub description: Option<String>,
    pub study_date: NaiveDate,
    pub accession_number: Option<String>,
    pub number_of_instances: u32,
    pub report_status: Option<String>,
}

/// One PBS dispensing event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispensingEvent {
    pub integration_id: IntegrationId,
    pub provider_record_id: String,
    pub patient_id: String,
    pub pbs_item_code: String,
    pub medication_name: String,
    pub quantity: u32,
    pub repeats: u32,
    pub dispensed_at: DateTime<Utc>,
    pub prescriber_id: Option<String>,
}

/// Lifecycle state of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Submitted,
    Processing,
    Paid,
    Rejected,
}

impl ClaimStatus {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "submitted" | "lodged" => Ok(ClaimStatus::Submitted),
            "processing" | "pending" => Ok(ClaimStatus::Processing),
            "paid" => Ok(ClaimStatus::Paid),
            "rejected" | "declined" => Ok(ClaimStatus::Rejected),
            other => Err(format!("unknown claim status '{other}'")),
        }
    }
}

/// One billing transaction derived from a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingTransaction {
    pub integration_id: IntegrationId,
    /// Claim id
    pub provider_record_id: String,
    pub patient_id: String,
    /// MBS item number
    pub item_number: String,
    pub amount_cents: i64,
    pub benefit_paid_cents: Option<i64>,
    pub status: ClaimStatus,
    pub service_date: NaiveDate,
}

impl_natural_key!(
    PatientRecord,
    PathologyResult,
    ImagingStudy,
    DispensingEvent,
    BillingTransaction,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abnormal_flags() {
        assert_eq!(AbnormalFlag::from_hl7(None).unwrap(), AbnormalFlag::Normal);
        assert_eq!(
            AbnormalFlag::from_hl7(Some("HH")).unwrap(),
            AbnormalFlag::CriticalHigh
        );
        assert!(AbnormalFlag::from_hl7(Some("LL")).unwrap().is_critical());
        assert!(!AbnormalFlag::from_hl7(Some("H")).unwrap().is_critical());
        assert!(AbnormalFlag::from_hl7(Some("ZZ")).is_err());
    }

    #[test]
    fn test_claim_status_aliases() {
        assert_eq!(ClaimStatus::parse("Lodged").unwrap(), ClaimStatus::Submitted);
        assert_eq!(ClaimStatus::parse("paid").unwrap(), ClaimStatus::Paid);
        assert!(ClaimStatus::parse("lost").is_err());
    }

    #[test]
    fn test_natural_key() {
        let record = PatientRecord {
            integration_id: IntegrationId::new("mhr").unwrap(),
            provider_record_id: "pat-77".to_string(),
            ihi: None,
            family_name: "Nguyen".to_string(),
            given_names: vec!["An".to_string()],
            birth_date: None,
            gender: None,
        };
        assert_eq!(record.natural_key(), "mhr:pat-77");
    }
}
