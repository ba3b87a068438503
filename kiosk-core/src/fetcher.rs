use std::sync::Arc;

use kiosk_model::{Asset, WeightedCandidate};
use tracing::{debug, instrument};

use crate::{
    cache::{BatchCache, CacheKey, TakeOutcome},
    error::{KioskError, Result},
    filter::FilterPolicy,
    provider::{AssetProvider, BatchQuery, dto::validate_batch},
};

pub const DEFAULT_RETRY_BUDGET: usize = 3;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Shared working set of not-yet-shown assets, one batch per cache key.
pub type AssetBatches = BatchCache<Vec<Asset>>;

/// Draws one displayable asset for a chosen source.
///
/// Batches are requested from the provider on a miss and then consumed one
/// asset at a time, so consecutive calls for the same key never return the
/// same asset until the batch is exhausted or expires.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    batches: Arc<AssetBatches>,
    retry_budget: usize,
    page_size: u32,
}

impl AssetFetcher {
    pub fn new(batches: Arc<AssetBatches>) -> Self {
        Self {
            batches,
            retry_budget: DEFAULT_RETRY_BUDGET,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_retry_budget(mut self, budget: usize) -> Self {
        self.retry_budget = budget.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn batches(&self) -> &Arc<AssetBatches> {
        &self.batches
    }

    pub fn batch_query(
        &self,
        candidate: &WeightedCandidate,
        policy: &FilterPolicy,
    ) -> BatchQuery {
        BatchQuery {
            source: candidate.source.clone(),
            kinds: policy.kinds.clone(),
            page_size: self.page_size,
            include_archived: policy.show_archived,
        }
    }

    #[instrument(skip(self, provider, policy), fields(source = %candidate.source))]
    pub async fn fetch(
        &self,
        provider: &dyn AssetProvider,
        candidate: &WeightedCandidate,
        policy: &FilterPolicy,
        device: &str,
        user: &str,
    ) -> Result<Asset> {
        let query = self.batch_query(candidate, policy);
        let key = CacheKey::new(&query.canonical(), device, user);
        let source = &candidate.source;

        let mut attempts = 0;
        while attempts < self.retry_budget {
            attempts += 1;

            if !self.batches.is_enabled() {
                let batch = self.request_batch(provider, &query).await?;
                if let Some(asset) =
                    batch.into_iter().find(|asset| policy.accepts(asset, source))
                {
                    return Ok(asset);
                }
                debug!(attempts, "batch held no eligible asset");
                continue;
            }

            if self.batches.contains_valid(&key, |batch| validate_batch(batch)) {
                debug!(key = %key, "batch cache hit");
            } else {
                debug!(key = %key, "batch cache miss");
                let batch = self.request_batch(provider, &query).await?;
                self.batches.set(key.clone(), batch);
            }

            match self
                .batches
                .take_first(&key, |asset| policy.accepts(asset, source))
            {
                TakeOutcome::Taken(asset) => return Ok(asset),
                TakeOutcome::Exhausted | TakeOutcome::Missing => {
                    debug!(key = %key, attempts, "batch exhausted, discarding");
                    self.batches.delete(&key);
                }
            }
        }

        Err(KioskError::NoAssetsFound(source.clone()))
    }

    async fn request_batch(
        &self,
        provider: &dyn AssetProvider,
        query: &BatchQuery,
    ) -> Result<Vec<Asset>> {
        let mut batch = provider.random_batch(query).await?;
        batch.retain(|asset| !asset.id.is_empty());
        Ok(batch)
    }
}
