//! Provider sync strategies
//!
//! One [`ProviderSyncStrategy`] per integration type, looked up through the
//! [`StrategyRegistry`]. The five built-in strategies are [`FeedStrategy`]
//! instances over a provider-specific [`ResourceFeed`]:
//!
//! | Type          | Request                    | List field |
//! |---------------|----------------------------|------------|
//! | health-record | `GET /Patient` (FHIR)      | `entry`    |
//! | pathology     | `GET /results`             | `results`  |
//! | imaging       | `GET /studies`             | `studies`  |
//! | pharmacy      | `GET /dispensings`         | `dispensings` |
//! | billing       | `POST /claims/search`      | `claims`   |

pub mod billing;
pub mod feed;
pub mod health_record;
pub mod imaging;
pub mod pathology;
pub mod pharmacy;
pub mod registry;

pub use feed::{FeedStrategy, ResourceFeed};
pub use registry::StrategyRegistry;

use crate::adapters::auth::AuthenticatedClient;
use crate::adapters::http::RetryPolicy;
use crate::adapters::store::RecordSink;
use crate::domain::{IntegrationConfig, IntegrationType, SyncResult};
use async_trait::async_trait;
use std::time::Duration;

/// Everything a strategy needs for one run
pub struct SyncContext<'a> {
    pub integration: &'a IntegrationConfig,
    /// Client carrying the integration's credentials
    pub client: AuthenticatedClient,
    pub sink: &'a dyn RecordSink,
    /// Retries for the listing request
    pub retry: RetryPolicy,
    /// Upper bound for persisting one record
    pub record_timeout: Duration,
}

/// Fetches one provider's resources and upserts them as canonical records
///
/// `sync` never fails: a failed listing yields an unsuccessful
/// [`SyncResult`] with no records processed, and per-record failures are
/// counted in the result.
#[async_trait]
pub trait ProviderSyncStrategy: Send + Sync {
    fn integration_type(&self) -> IntegrationType;

    /// Label used in error messages
    fn label(&self) -> &'static str;

    async fn sync(&self, ctx: &SyncContext<'_>) -> SyncResult;
}
