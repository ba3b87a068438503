//! Turns configured sources into weighted candidates.

use futures::future::join_all;
use kiosk_model::{Source, WeightedCandidate};
use tracing::{debug, warn};

use crate::provider::AssetProvider;

/// Counts every source concurrently and keeps the non-empty ones, in
/// configuration order.
///
/// A failed count only drops that source. An empty result is valid and
/// means the whole library is eligible.
pub async fn gather(
    provider: &dyn AssetProvider,
    sources: &[Source],
) -> Vec<WeightedCandidate> {
    let counts = join_all(sources.iter().map(|source| provider.count(source))).await;

    sources
        .iter()
        .zip(counts)
        .filter_map(|(source, count)| match count {
            Ok(0) => {
                debug!(%source, "source matches no assets, skipping");
                None
            }
            Ok(weight) => Some(WeightedCandidate::new(source.clone(), weight)),
            Err(err) => {
                warn!(%source, error = %err, "failed to count source, skipping");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{KioskError, ProviderError, Result},
        provider::BatchQuery,
    };
    use async_trait::async_trait;
    use kiosk_model::{AlbumId, Asset, AssetId, PersonId};

    #[derive(Debug)]
    struct CountingProvider;

    #[async_trait]
    impl AssetProvider for CountingProvider {
        async fn count(&self, source: &Source) -> Result<u64> {
            match source {
                Source::Person(id) if id.as_str() == "busy" => {
                    Err(ProviderError::Status {
                        status: 503,
                        message: "unavailable".into(),
                    }
                    .into())
                }
                Source::Person(_) => Ok(5),
                Source::Album(id) if id.as_str() == "empty" => Ok(0),
                Source::Album(_) => Ok(50),
                _ => Ok(1),
            }
        }

        async fn random_batch(&self, _query: &BatchQuery) -> Result<Vec<Asset>> {
            Ok(Vec::new())
        }

        async fn asset(&self, id: &AssetId) -> Result<Asset> {
            Err(KioskError::Provider(ProviderError::NotFound(id.to_string())))
        }

        async fn preview(&self, _id: &AssetId) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn drops_empty_and_failing_sources_in_order() {
        let sources = vec![
            Source::Album(AlbumId::new("a1")),
            Source::Person(PersonId::new("busy")),
            Source::Album(AlbumId::new("empty")),
            Source::Person(PersonId::new("p1")),
            Source::Favourites,
        ];

        let candidates = gather(&CountingProvider, &sources).await;

        assert_eq!(
            candidates,
            vec![
                WeightedCandidate::new(Source::Album(AlbumId::new("a1")), 50),
                WeightedCandidate::new(Source::Person(PersonId::new("p1")), 5),
                WeightedCandidate::new(Source::Favourites, 1),
            ]
        );
    }

    #[tokio::test]
    async fn no_sources_means_no_candidates() {
        assert!(gather(&CountingProvider, &[]).await.is_empty());
    }
}
