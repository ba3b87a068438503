//! Boundary to the remote photo-management service.

pub mod dto;
pub mod http;
pub mod retry;

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;
use kiosk_model::{Asset, AssetId, AssetKind, Source};

use crate::{
    cache::CanonicalQuery,
    error::{KioskError, Result},
};

pub use http::{HttpAssetProvider, HttpProviderConfig};
pub use retry::RetryPolicy;

/// Parameters of one randomized batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchQuery {
    pub source: Source,
    pub kinds: Vec<AssetKind>,
    pub page_size: u32,
    pub include_archived: bool,
}

impl BatchQuery {
    /// Stable encoding of the query, used as the batch cache key prefix.
    pub fn canonical(&self) -> CanonicalQuery {
        let mut pairs: Vec<(&str, String)> = vec![
            ("source", self.source.to_string()),
            ("size", self.page_size.to_string()),
            ("archived", self.include_archived.to_string()),
        ];
        for kind in &self.kinds {
            pairs.push(("type", kind.to_string()));
        }
        CanonicalQuery::from_pairs(pairs)
    }
}

/// Read-only view of the asset provider the pipeline needs.
#[async_trait]
pub trait AssetProvider: Send + Sync + fmt::Debug {
    /// Number of assets currently matching `source`.
    async fn count(&self, source: &Source) -> Result<u64>;

    /// A provider-randomized batch of assets for `query`.
    async fn random_batch(&self, query: &BatchQuery) -> Result<Vec<Asset>>;

    /// Assets of the "on this day" memories for `day`.
    ///
    /// Providers without a memories feature report none.
    async fn memories(&self, _day: NaiveDate) -> Result<Vec<Asset>> {
        Ok(Vec::new())
    }

    /// Fresh metadata for a single asset.
    async fn asset(&self, id: &AssetId) -> Result<Asset>;

    /// Encoded preview image bytes for a single asset.
    async fn preview(&self, id: &AssetId) -> Result<Vec<u8>>;
}

/// Providers keyed by the user they authenticate as.
///
/// The empty user name maps to the default provider.
#[derive(Debug, Clone)]
pub struct ProviderSet {
    default: Arc<dyn AssetProvider>,
    users: HashMap<String, Arc<dyn AssetProvider>>,
}

impl ProviderSet {
    pub fn new(default: Arc<dyn AssetProvider>) -> Self {
        Self {
            default,
            users: HashMap::new(),
        }
    }

    pub fn with_user(
        mut self,
        user: impl Into<String>,
        provider: Arc<dyn AssetProvider>,
    ) -> Self {
        self.users.insert(user.into(), provider);
        self
    }

    pub fn for_user(&self, user: &str) -> Result<Arc<dyn AssetProvider>> {
        if user.is_empty() {
            return Ok(Arc::clone(&self.default));
        }
        self.users
            .get(user)
            .cloned()
            .ok_or_else(|| KioskError::Config(format!("unknown user '{user}'")))
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_model::PersonId;

    #[test]
    fn canonical_query_is_order_independent_for_kinds() {
        let a = BatchQuery {
            source: Source::Person(PersonId::new("p1")),
            kinds: vec![AssetKind::Image, AssetKind::Video],
            page_size: 100,
            include_archived: false,
        };
        let b = BatchQuery {
            kinds: vec![AssetKind::Video, AssetKind::Image],
            ..a.clone()
        };
        assert_eq!(a.canonical(), b.canonical());
        assert_ne!(
            a.canonical(),
            BatchQuery {
                page_size: 50,
                ..a.clone()
            }
            .canonical()
        );
    }
}
