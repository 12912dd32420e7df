//! National health record system (FHIR R4 Patient search)

use super::feed::{endpoint, since, ResourceFeed};
use super::SyncContext;
use crate::adapters::store::{RecordSink, UpsertOutcome};
use crate::domain::{IntegrationId, IntegrationType, PatientRecord, ProviderError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::RequestBuilder;
use serde_json::Value;

/// Identifier system of the Individual Healthcare Identifier
pub const IHI_SYSTEM: &str = "http://ns.electronichealth.net.au/id/hi/ihi/1.0";

/// Patients requested per search page
const PAGE_SIZE: &str = "100";

pub struct HealthRecordFeed;

#[async_trait]
impl ResourceFeed for HealthRecordFeed {
    type Record = PatientRecord;

    const INTEGRATION_TYPE: IntegrationType = IntegrationType::HealthRecord;
    const LABEL: &'static str = "Health record";
    const LIST_FIELD: &'static str = "entry";
    const ID_FIELD: &'static str = "id";

    fn listing(&self, ctx: &SyncContext<'_>) -> RequestBuilder {
        let mut query = vec![("_count", PAGE_SIZE.to_string())];
        if let Some(since) = since(ctx) {
            query.push(("_lastUpdated", format!("gt{since}")));
        }
        ctx.client
            .get(&endpoint(ctx, "Patient"))
            .header(reqwest::header::ACCEPT, "application/fhir+json")
            .query(&query)
    }

    /// Unwraps `entry[].resource` from a searchset Bundle
    ///
    /// A Bundle with no matches omits `entry` entirely.
    fn items(&self, body: Value) -> std::result::Result<Vec<Value>, ProviderError> {
        if body.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
            return Err(ProviderError::InvalidResponse(
                "expected a FHIR Bundle".to_string(),
            ));
        }
        match body.get("entry") {
            None => Ok(Vec::new()),
            Some(Value::Array(entries)) => Ok(entries
                .iter()
                .map(|entry| entry.get("resource").cloned().unwrap_or(Value::Null))
                .collect()),
            Some(_) => Err(ProviderError::InvalidResponse(
                "'entry' is not an array".to_string(),
            )),
        }
    }

    fn map(
        &self,
        integration_id: &IntegrationId,
        resource: &Value,
    ) -> std::result::Result<PatientRecord, String> {
        if resource.get("resourceType").and_then(Value::as_str) != Some("Patient") {
            return Err("entry is not a Patient resource".to_string());
        }
        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or("missing id")?;

        let name = preferred_name(resource).ok_or("missing name")?;
        let family_name = name
            .get("family")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or("missing name.family")?
            .trim()
            .to_string();
        let given_names = name
            .get("given")
            .and_then(Value::as_array)
            .map(|given| {
                given
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(PatientRecord {
            integration_id: integration_id.clone(),
            provider_record_id: id.to_string(),
            ihi: ihi(resource)?,
            family_name,
            given_names,
            birth_date: birth_date(resource)?,
            gender: resource
                .get("gender")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    async fn persist(&self, sink: &dyn RecordSink, record: &PatientRecord) -> Result<UpsertOutcome> {
        sink.upsert_patient(record).await
    }
}

/// The `official` name if present, otherwise the first one
fn preferred_name(resource: &Value) -> Option<&Value> {
    let names = resource.get("name")?.as_array()?;
    names
        .iter()
        .find(|n| n.get("use").and_then(Value::as_str) == Some("official"))
        .or_else(|| names.first())
}

/// IHI from the identifier list; 16 digits when present
fn ihi(resource: &Value) -> std::result::Result<Option<String>, String> {
    let value = resource
        .get("identifier")
        .and_then(Value::as_array)
        .and_then(|ids| {
            ids.iter()
                .find(|id| id.get("system").and_then(Value::as_str) == Some(IHI_SYSTEM))
        })
        .and_then(|id| id.get("value"))
        .and_then(Value::as_str)
        .map(|v| v.replace(' ', ""));

    match value {
        Some(v) if v.len() == 16 && v.bytes().all(|b| b.is_ascii_digit()) => Ok(Some(v)),
        Some(v) => Err(format!("invalid IHI '{v}'")),
        None => Ok(None),
    }
}

/// FHIR dates may be partial (`YYYY`, `YYYY-MM`); only full dates are kept
fn birth_date(resource: &Value) -> std::result::Result<Option<NaiveDate>, String> {
    match resource.get("birthDate").and_then(Value::as_str) {
        Some(s) if s.len() == 10 => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("birthDate '{s}' is not a valid date")),
        _ => Ok(None),
    }
}
