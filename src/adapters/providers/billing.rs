//! Billing and claims system feed

use super::feed::{endpoint, parse_date, required_str, since, ResourceFeed};
use super::SyncContext;
use crate::adapters::store::{RecordSink, UpsertOutcome};
use crate::domain::{BillingTransaction, ClaimStatus, IntegrationId, IntegrationType, Result};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::{json, Value};

pub struct BillingFeed;

#[async_trait]
impl ResourceFeed for BillingFeed {
    type Record = BillingTransaction;

    const INTEGRATION_TYPE: IntegrationType = IntegrationType::Billing;
    const LABEL: &'static str = "Billing";
    const LIST_FIELD: &'static str = "claims";
    const ID_FIELD: &'static str = "claimId";

    fn listing(&self, ctx: &SyncContext<'_>) -> RequestBuilder {
        ctx.client
            .post(&endpoint(ctx, "claims/search"))
            .json(&json!({ "since": since(ctx) }))
    }

    fn map(
        &self,
        integration_id: &IntegrationId,
        item: &Value,
    ) -> std::result::Result<BillingTransaction, String> {
        let amount_cents = cents(item, "amount")?.ok_or("missing amount")?;
        if amount_cents < 0 {
            return Err("amount cannot be negative".to_string());
        }

        Ok(BillingTransaction {
            integration_id: integration_id.clone(),
            provider_record_id: required_str(item, "claimId")?,
            patient_id: required_str(item, "patientId")?,
            item_number: required_str(item, "itemNumber")?,
            amount_cents,
            benefit_paid_cents: cents(item, "benefitPaid")?,
            status: ClaimStatus::parse(&required_str(item, "status")?)?,
            service_date: parse_date(
                &required_str(item, "serviceDate")?,
                "%Y-%m-%d",
                "serviceDate",
            )?,
        })
    }

    async fn persist(
        &self,
        sink: &dyn RecordSink,
        record: &BillingTransaction,
    ) -> Result<UpsertOutcome> {
        sink.upsert_billing_transaction(record).await
    }
}

/// Dollar amount (number or decimal string) converted to whole cents
fn cents(item: &Value, field: &str) -> std::result::Result<Option<i64>, String> {
    let dollars = match item.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match dollars {
        Some(d) if d.is_finite() => Ok(Some((d * 100.0).round() as i64)),
        _ => Err(format!("{field} is not a monetary amount")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_claim() {
        let item = json!({
            "claimId": "clm-55",
            "patientId": "p-2",
            "itemNumber": "23",
            "amount": 41.4,
            "benefitPaid": "39.75",
            "status": "paid",
            "serviceDate": "2025-06-30"
        });

        let tx = BillingFeed
            .map(&IntegrationId::new("billing").unwrap(), &item)
            .unwrap();
        assert_eq!(tx.amount_cents, 4140);
        assert_eq!(tx.benefit_paid_cents, Some(3975));
        assert_eq!(tx.status, ClaimStatus::Paid);
        assert_eq!(tx.natural_key(), "billing:clm-55");
    }

    #[test]
    fn test_cents_rejects_garbage() {
        assert!(cents(&json!({"amount": "forty"}), "amount").is_err());
        assert_eq!(cents(&json!({}), "amount").unwrap(), None);
    }

    #[test]
    fn test_unknown_status_rejected() {
        let item = json!({
            "claimId": "clm-56",
            "patientId": "p-2",
            "itemNumber": "23",
            "amount": 10,
            "status": "lost",
            "serviceDate": "2025-06-30"
        });
        assert!(BillingFeed
            .map(&IntegrationId::new("billing").unwrap(), &item)
            .is_err());
    }
}
