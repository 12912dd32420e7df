//! Pathology laboratory result feed (HL7 over REST)

use super::feed::{endpoint, optional_datetime, optional_str, required_str, since, ResourceFeed};
use super::SyncContext;
use crate::adapters::store::{RecordSink, UpsertOutcome};
use crate::domain::{AbnormalFlag, IntegrationId, IntegrationType, PathologyResult, Result};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;

pub struct PathologyFeed;

#[async_trait]
impl ResourceFeed for PathologyFeed {
    type Record = PathologyResult;

    const INTEGRATION_TYPE: IntegrationType = IntegrationType::Pathology;
    const LABEL: &'static str = "Pathology";
    const LIST_FIELD: &'static str = "results";
    const ID_FIELD: &'static str = "id";

    fn listing(&self, ctx: &SyncContext<'_>) -> RequestBuilder {
        let request = ctx.client.get(&endpoint(ctx, "results"));
        match since(ctx) {
            Some(since) => request.query(&[("since", since)]),
            None => request,
        }
    }

    fn map(
        &self,
        integration_id: &IntegrationId,
        item: &Value,
    ) -> std::result::Result<PathologyResult, String> {
        let flag = AbnormalFlag::from_hl7(item.get("abnormalFlag").and_then(Value::as_str))?;

        Ok(PathologyResult {
            integration_id: integration_id.clone(),
            provider_record_id: required_str(item, "id")?,
            patient_id: required_str(item, "patientId")?,
            test_code: required_str(item, "testCode")?,
            test_name: required_str(item, "testName")?,
            value: required_str(item, "value")?,
            units: optional_str(item, "units"),
            reference_range: optional_str(item, "referenceRange"),
            flag,
            status: optional_str(item, "status").unwrap_or_else(|| "final".to_string()),
            collected_at: optional_datetime(item, "collectedAt")?,
            reported_at: optional_datetime(item, "reportedAt")?,
        })
    }

    async fn persist(&self, sink: &dyn RecordSink, record: &PathologyResult) -> Result<UpsertOutcome> {
        sink.upsert_pathology_result(record).await
    }

    fn is_critical(&self, record: &PathologyResult) -> bool {
        record.flag.is_critical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn integration_id() -> IntegrationId {
        IntegrationId::new("lab").unwrap()
    }

    #[test]
    fn test_map_result() {
        let item = json!({
            "id": "r-100",
            "patientId": "p-7",
            "testCode": "2823-3",
            "testName": "Potassium",
            "value": 6.9,
            "units": "mmol/L",
            "referenceRange": "3.5-5.2",
            "abnormalFlag": "HH",
            "collectedAt": "2025-04-01T08:30:00Z"
        });

        let result = PathologyFeed.map(&integration_id(), &item).unwrap();
        assert_eq!(result.natural_key(), "lab:r-100");
        assert_eq!(result.value, "6.9");
        assert_eq!(result.status, "final");
        assert!(PathologyFeed.is_critical(&result));
        assert!(result.reported_at.is_none());
    }

    #[test]
    fn test_map_rejects_unknown_flag() {
        let item = json!({
            "id": "r-101",
            "patientId": "p-7",
            "testCode": "2823-3",
            "testName": "Potassium",
            "value": "4.1",
            "abnormalFlag": "XX"
        });
        let err = PathologyFeed.map(&integration_id(), &item).unwrap_err();
        assert!(err.contains("XX"));
    }

    #[test]
    fn test_map_requires_patient() {
        let item = json!({"id": "r-102", "testCode": "1", "testName": "Na", "value": "140"});
        assert_eq!(
            PathologyFeed.map(&integration_id(), &item).unwrap_err(),
            "missing patientId"
        );
    }
}
