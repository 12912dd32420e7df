//! Pharmacy network PBS dispensing feed

use super::feed::{
    endpoint, optional_str, optional_u32, required_datetime, required_str, since, ResourceFeed,
};
use super::SyncContext;
use crate::adapters::store::{RecordSink, UpsertOutcome};
use crate::domain::{DispensingEvent, IntegrationId, IntegrationType, Result};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;

pub struct PharmacyFeed;

#[async_trait]
impl ResourceFeed for PharmacyFeed {
    type Record = DispensingEvent;

    const INTEGRATION_TYPE: IntegrationType = IntegrationType::Pharmacy;
    const LABEL: &'static str = "Pharmacy";
    const LIST_FIELD: &'static str = "dispensings";
    const ID_FIELD: &'static str = "id";

    fn listing(&self, ctx: &SyncContext<'_>) -> RequestBuilder {
        let request = ctx.client.get(&endpoint(ctx, "dispensings"));
        match since(ctx) {
            Some(since) => request.query(&[("since", since)]),
            None => request,
        }
    }

    fn map(
        &self,
        integration_id: &IntegrationId,
        item: &Value,
    ) -> std::result::Result<DispensingEvent, String> {
        let pbs_item_code = required_str(item, "pbsItemCode")?.to_ascii_uppercase();
        if !is_pbs_item_code(&pbs_item_code) {
            return Err(format!("'{pbs_item_code}' is not a PBS item code"));
        }
        let quantity = optional_u32(item, "quantity")?
            .filter(|q| *q > 0)
            .ok_or_else(|| "quantity must be a positive integer".to_string())?;

        Ok(DispensingEvent {
            integration_id: integration_id.clone(),
            provider_record_id: required_str(item, "id")?,
            patient_id: required_str(item, "patientId")?,
            pbs_item_code,
            medication_name: required_str(item, "medicationName")?,
            quantity,
            repeats: optional_u32(item, "repeats")?.unwrap_or(0),
            dispensed_at: required_datetime(item, "dispensedAt")?,
            prescriber_id: optional_str(item, "prescriberId"),
        })
    }

    async fn persist(&self, sink: &dyn RecordSink, record: &DispensingEvent) -> Result<UpsertOutcome> {
        sink.upsert_dispensing_event(record).await
    }
}

/// PBS item codes are 4 to 6 alphanumerics, e.g. `2622B` or `10012X`
fn is_pbs_item_code(code: &str) -> bool {
    (4..=6).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_alphanumeric())
}
