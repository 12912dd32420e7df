//! Integration type to strategy map

use super::billing::BillingFeed;
use super::health_record::HealthRecordFeed;
use super::imaging::ImagingFeed;
use super::pathology::PathologyFeed;
use super::pharmacy::PharmacyFeed;
use super::{FeedStrategy, ProviderSyncStrategy};
use crate::domain::IntegrationType;
use std::collections::HashMap;
use std::sync::Arc;

/// Registered sync strategies, at most one per integration type
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<IntegrationType, Arc<dyn ProviderSyncStrategy>>,
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in strategies
    ///
    /// `specialist` has none; syncing such an integration is a configuration
    /// error until a strategy is registered for it.
    pub fn with_defaults() -> Self {
        Self::new()
            .with(FeedStrategy::new(HealthRecordFeed))
            .with(FeedStrategy::new(PathologyFeed))
            .with(FeedStrategy::new(ImagingFeed))
            .with(FeedStrategy::new(PharmacyFeed))
            .with(FeedStrategy::new(BillingFeed))
    }

    /// Registers `strategy` for its integration type, replacing any
    /// earlier one
    pub fn register(&mut self, strategy: Arc<dyn ProviderSyncStrategy>) {
        self.strategies.insert(strategy.integration_type(), strategy);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, strategy: impl ProviderSyncStrategy + 'static) -> Self {
        self.register(Arc::new(strategy));
        self
    }

    pub fn get(&self, integration_type: IntegrationType) -> Option<Arc<dyn ProviderSyncStrategy>> {
        self.strategies.get(&integration_type).cloned()
    }

    pub fn supports(&self, integration_type: IntegrationType) -> bool {
        self.strategies.contains_key(&integration_type)
    }
}
