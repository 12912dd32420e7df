//! Shared list-then-upsert algorithm
//!
//! Every provider follows the same shape: one listing request, then each
//! returned item mapped and persisted on its own. A [`ResourceFeed`] supplies
//! the provider-specific parts; [`FeedStrategy`] runs the algorithm.
//!
//! - A failed listing (after transient retries) fails the whole sync with no
//!   records processed.
//! - A failed item is counted and reported but never stops the loop.

use super::{ProviderSyncStrategy, SyncContext};
use crate::adapters::http::send_json;
use crate::adapters::store::{RecordSink, UpsertOutcome};
use crate::domain::{
    IntegrationId, IntegrationType, ProviderError, Result, SyncResult, SyncTally,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::RequestBuilder;
use serde_json::Value;
use std::time::Instant;

/// Provider-specific half of a sync strategy
#[async_trait]
pub trait ResourceFeed: Send + Sync + 'static {
    /// Canonical record produced from one provider item
    type Record: Send + Sync;

    const INTEGRATION_TYPE: IntegrationType;

    /// Human label used in error messages, e.g. "Pharmacy"
    const LABEL: &'static str;

    /// Field of the listing body holding the item array
    const LIST_FIELD: &'static str;

    /// Field of an item holding the provider record id
    const ID_FIELD: &'static str;

    /// Builds the listing request
    fn listing(&self, ctx: &SyncContext<'_>) -> RequestBuilder;

    /// Extracts the items from a listing body
    fn items(&self, body: Value) -> std::result::Result<Vec<Value>, ProviderError> {
        list_field(body, Self::LIST_FIELD)
    }

    /// Maps one provider item into the canonical record
    fn map(
        &self,
        integration_id: &IntegrationId,
        item: &Value,
    ) -> std::result::Result<Self::Record, String>;

    /// Upserts one record into the sink
    async fn persist(&self, sink: &dyn RecordSink, record: &Self::Record) -> Result<UpsertOutcome>;

    /// Whether a persisted record needs clinical attention
    fn is_critical(&self, _record: &Self::Record) -> bool {
        false
    }
}

/// Sync strategy running the shared algorithm over a feed
pub struct FeedStrategy<F> {
    feed: F,
}

impl<F: ResourceFeed> FeedStrategy<F> {
    pub fn new(feed: F) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl<F: ResourceFeed> ProviderSyncStrategy for FeedStrategy<F> {
    fn integration_type(&self) -> IntegrationType {
        F::INTEGRATION_TYPE
    }

    fn label(&self) -> &'static str {
        F::LABEL
    }

    async fn sync(&self, ctx: &SyncContext<'_>) -> SyncResult {
        let started = Instant::now();
        let integration_id = &ctx.integration.id;

        let listing = ctx
            .retry
            .run(|| send_json(self.feed.listing(ctx)))
            .await
            .and_then(|body| self.feed.items(body));

        let items = match listing {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    integration_id = %integration_id,
                    error = %e,
                    "Listing request failed"
                );
                return SyncResult::listing_failed(
                    format!("{} sync failed: {e}", F::LABEL),
                    elapsed_ms(started),
                );
            }
        };

        tracing::debug!(
            integration_id = %integration_id,
            items = items.len(),
            "Listing returned"
        );

        let mut tally = SyncTally::new();
        let mut critical = 0u64;

        for (index, item) in items.iter().enumerate() {
            let label = item_label(item, F::ID_FIELD, index);

            let record = match self.feed.map(integration_id, item) {
                Ok(record) => record,
                Err(reason) => {
                    tracing::debug!(
                        integration_id = %integration_id,
                        record = %label,
                        reason = %reason,
                        "Record mapping failed"
                    );
                    tally.record_failure(format!("Record {label}: {reason}"));
                    continue;
                }
            };

            match tokio::time::timeout(ctx.record_timeout, self.feed.persist(ctx.sink, &record))
                .await
            {
                Ok(Ok(_)) => {
                    if self.feed.is_critical(&record) {
                        critical += 1;
                    }
                    tally.record_success();
                }
                Ok(Err(e)) => tally.record_failure(format!("Record {label}: {e}")),
                Err(_) => tally.record_failure(format!(
                    "Record {label}: persist timed out after {}ms",
                    ctx.record_timeout.as_millis()
                )),
            }
        }

        if critical > 0 {
            tracing::warn!(
                integration_id = %integration_id,
                critical_results = critical,
                "Critical results received"
            );
        }

        tally.finish(elapsed_ms(started))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn item_label(item: &Value, id_field: &str, index: usize) -> String {
    match item.get(id_field) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("#{}", index + 1),
    }
}

/// Endpoint URL for `path` under the integration's API base
pub(crate) fn endpoint(ctx: &SyncContext<'_>, path: &str) -> String {
    format!(
        "{}/{}",
        ctx.integration.api_endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Incremental sync cursor, RFC 3339
///
/// Only clean runs advance the cursor, so records from a failed listing or a
/// failed item are fetched again.
pub(crate) fn since(ctx: &SyncContext<'_>) -> Option<String> {
    ctx.integration
        .sync_cursor
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

fn list_field(mut body: Value, field: &str) -> std::result::Result<Vec<Value>, ProviderError> {
    match body.get_mut(field).map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ProviderError::InvalidResponse(format!(
            "'{field}' is not an array"
        ))),
        None => Err(ProviderError::InvalidResponse(format!(
            "response has no '{field}' field"
        ))),
    }
}

// Field helpers for item mapping

pub(crate) fn required_str(item: &Value, field: &str) -> std::result::Result<String, String> {
    optional_str(item, field).ok_or_else(|| format!("missing {field}"))
}

pub(crate) fn optional_str(item: &Value, field: &str) -> Option<String> {
    match item.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn optional_u32(item: &Value, field: &str) -> std::result::Result<Option<u32>, String> {
    match item.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| format!("{field} is not a non-negative integer")),
    }
}

pub(crate) fn optional_datetime(
    item: &Value,
    field: &str,
) -> std::result::Result<Option<DateTime<Utc>>, String> {
    match optional_str(item, field) {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| format!("{field} '{s}' is not an RFC 3339 timestamp")),
    }
}

pub(crate) fn required_datetime(
    item: &Value,
    field: &str,
) -> std::result::Result<DateTime<Utc>, String> {
    optional_datetime(item, field)?.ok_or_else(|| format!("missing {field}"))
}

pub(crate) fn parse_date(
    value: &str,
    format: &str,
    field: &str,
) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, format)
        .map_err(|_| format!("{field} '{value}' is not a valid date"))
}
