use std::{fmt, time::Duration};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use kiosk_model::{Asset, AssetId, Source};
use rand::seq::SliceRandom;
use reqwest::{Method, header};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;
use url::Url;

use super::{
    AssetProvider, BatchQuery,
    dto::{
        AlbumResponse, AssetResponse, AssetStatistics, ErrorEnvelope,
        MemoryResponse, PersonStatistics, RandomSearchBody, SearchStatistics,
        SearchStatisticsBody, day_end, day_start,
    },
    retry::RetryPolicy,
};
use crate::error::{KioskError, ProviderError, Result};

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct HttpProviderConfig {
    pub base_url: Url,
    pub api_key: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl fmt::Debug for HttpProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProviderConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl HttpProviderConfig {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            base_url,
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// [`AssetProvider`] backed by the provider's JSON/HTTP API.
#[derive(Clone)]
pub struct HttpAssetProvider {
    http: reqwest::Client,
    config: HttpProviderConfig,
}

impl fmt::Debug for HttpAssetProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAssetProvider")
            .field("config", &self.config)
            .finish()
    }
}

impl HttpAssetProvider {
    pub fn new(mut config: HttpProviderConfig) -> Result<Self> {
        // `Url::join` replaces the last path segment unless it ends in '/'.
        if !config.base_url.path().ends_with('/') {
            let path = format!("{}/", config.base_url.path());
            config.base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::from)?;

        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| KioskError::Config(format!("invalid endpoint {path}: {e}")))
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&(dyn erased::JsonBody + Sync)>,
    ) -> Result<Vec<u8>> {
        let url = self.endpoint(path)?;
        let mut request = self
            .http
            .request(method, url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .query(query);
        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.to_json()?);
        }

        let response = request.send().await.map_err(|err| self.classify(err))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| self.classify(err))?;

        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        let message = serde_json::from_slice::<ErrorEnvelope>(&bytes)
            .map(|envelope| envelope.describe())
            .ok()
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| format!("request failed with status {status}"));

        Err(match status.as_u16() {
            401 => ProviderError::Unauthorized(message),
            404 => ProviderError::NotFound(message),
            429 => ProviderError::RateLimited,
            code => ProviderError::Status {
                status: code,
                message,
            },
        }
        .into())
    }

    fn classify(&self, err: reqwest::Error) -> KioskError {
        if err.is_timeout() {
            ProviderError::Timeout(self.config.timeout).into()
        } else {
            ProviderError::Network(err).into()
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&(dyn erased::JsonBody + Sync)>,
    ) -> Result<Vec<u8>> {
        self.config
            .retry
            .run(path, move || {
                self.send_once(method.clone(), path, query, body)
            })
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let bytes = self.send(Method::GET, path, query, None).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let bytes = self.send(Method::POST, path, &[], Some(body)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn search_body(query: &BatchQuery) -> RandomSearchBody {
        let mut body = RandomSearchBody {
            size: query.page_size,
            kind: match query.kinds.as_slice() {
                [only] => Some(only.as_provider_tag()),
                _ => None,
            },
            visibility: (!query.include_archived).then_some("timeline"),
            with_exif: true,
            with_people: true,
            with_deleted: false,
            ..RandomSearchBody::default()
        };

        match &query.source {
            Source::Person(id) => body.person_ids.push(id.to_string()),
            Source::Album(id) => body.album_ids.push(id.to_string()),
            Source::Favourites => body.is_favorite = Some(true),
            Source::DateRange(range) => {
                body.taken_after = Some(day_start(range.start));
                body.taken_before = Some(day_end(range.end));
            }
            Source::Memories | Source::Library => {}
        }
        body
    }
}

mod erased {
    //! Object-safe JSON body so one retry closure serves every request shape.

    use serde::Serialize;

    use crate::error::Result;

    pub trait JsonBody {
        fn to_json(&self) -> Result<Vec<u8>>;
    }

    impl<T: Serialize> JsonBody for T {
        fn to_json(&self) -> Result<Vec<u8>> {
            Ok(serde_json::to_vec(self)?)
        }
    }
}

#[async_trait]
impl AssetProvider for HttpAssetProvider {
    async fn count(&self, source: &Source) -> Result<u64> {
        let count = match source {
            Source::Person(id) => {
                self.get_json::<PersonStatistics>(
                    &format!("api/people/{id}/statistics"),
                    &[],
                )
                .await?
                .assets
            }
            Source::Album(id) => {
                self.get_json::<AlbumResponse>(
                    &format!("api/albums/{id}"),
                    &[("withoutAssets", "true".to_string())],
                )
                .await?
                .asset_count
            }
            Source::Favourites => {
                self.get_json::<AssetStatistics>(
                    "api/assets/statistics",
                    &[("isFavorite", "true".to_string())],
                )
                .await?
                .total
            }
            Source::DateRange(range) => {
                let body = SearchStatisticsBody {
                    taken_after: Some(day_start(range.start)),
                    taken_before: Some(day_end(range.end)),
                };
                self.post_json::<_, SearchStatistics>(
                    "api/search/statistics",
                    &body,
                )
                .await?
                .total
            }
            Source::Memories => self.memories(Self::today()).await?.len() as u64,
            Source::Library => {
                self.get_json::<AssetStatistics>("api/assets/statistics", &[])
                    .await?
                    .total
            }
        };

        debug!(%source, count, "counted source");
        Ok(count)
    }

    async fn random_batch(&self, query: &BatchQuery) -> Result<Vec<Asset>> {
        if matches!(query.source, Source::Memories) {
            let mut assets: Vec<Asset> = self
                .memories(Self::today())
                .await?
                .into_iter()
                .filter(|asset| query.kinds.contains(&asset.kind))
                .collect();
            assets.shuffle(&mut rand::rng());
            assets.truncate(query.page_size as usize);
            return Ok(assets);
        }

        let body = Self::search_body(query);
        let assets: Vec<AssetResponse> =
            self.post_json("api/search/random", &body).await?;
        Ok(assets.into_iter().map(Asset::from).collect())
    }

    async fn memories(&self, day: NaiveDate) -> Result<Vec<Asset>> {
        let memories: Vec<MemoryResponse> = self
            .get_json("api/memories", &[("for", day_start(day).to_rfc3339())])
            .await?;
        Ok(memories
            .into_iter()
            .flat_map(|memory| memory.assets)
            .map(Asset::from)
            .collect())
    }

    async fn asset(&self, id: &AssetId) -> Result<Asset> {
        let dto: AssetResponse =
            self.get_json(&format!("api/assets/{id}"), &[]).await?;
        Ok(dto.into())
    }

    async fn preview(&self, id: &AssetId) -> Result<Vec<u8>> {
        self.send(
            Method::GET,
            &format!("api/assets/{id}/thumbnail"),
            &[("size", "preview".to_string())],
            None,
        )
        .await
    }
}
