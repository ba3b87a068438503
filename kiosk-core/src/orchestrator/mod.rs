//! Per-request driver tying the pipeline together.
//!
//! A request is served from the prefetched view queue when possible and
//! otherwise built synchronously; either way a background refill is queued so
//! the next request for the same display is a cache hit.

mod prefetch;

use std::{
    collections::HashSet,
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
};

use kiosk_model::{
    Asset, Orientation, RenderedAsset, RenderedView, Source, WeightedCandidate,
};
use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    cache::{CacheKey, CanonicalQuery, RenderedCache},
    catalog,
    error::{KioskError, Result},
    fetcher::{AssetBatches, AssetFetcher, DEFAULT_PAGE_SIZE, DEFAULT_RETRY_BUDGET},
    filter::FilterPolicy,
    history::{HistoryLedger, Previous},
    provider::{AssetProvider, ProviderSet},
    render::{RenderSettings, Renderer},
    selector,
    webhook::{WebhookEvent, WebhookNotifier},
};

/// How many assets make up one screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Single,
    /// Two portrait assets side by side, falling back to one asset when a
    /// second portrait cannot be found.
    Split,
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Layout::Single),
            "split" | "splitview" => Ok(Layout::Split),
            other => Err(format!("unknown layout '{other}'")),
        }
    }
}

/// What a display asked to see.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewSettings {
    pub sources: Vec<Source>,
    pub weighting: bool,
    pub policy: FilterPolicy,
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRequest {
    /// Canonical form of the request's display parameters; identifies the
    /// prefetch queue together with the device and user.
    pub view_query: CanonicalQuery,
    pub device: String,
    pub user: String,
    pub settings: ViewSettings,
    /// Whether to render the following screen in the background. Off for
    /// clients without a stable device id, whose queue would never be read.
    pub prefetch: bool,
}

impl ViewRequest {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.view_query, &self.device, &self.user)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub retry_budget: usize,
    pub page_size: u32,
    pub render: RenderSettings,
    /// Upper bound on concurrently running refills.
    pub max_background_tasks: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            page_size: DEFAULT_PAGE_SIZE,
            render: RenderSettings::default(),
            max_background_tasks: 4,
        }
    }
}

struct Inner {
    providers: ProviderSet,
    renderer: Arc<dyn Renderer>,
    notifier: Option<Arc<dyn WebhookNotifier>>,
    fetcher: AssetFetcher,
    rendered: Arc<RenderedCache>,
    settings: OrchestratorSettings,
    cancel: CancellationToken,
    permits: Semaphore,
    in_flight: Mutex<HashSet<CacheKey>>,
}

/// Cheap to clone; clones share caches, background permits and the
/// cancellation token.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.inner.providers)
            .field("renderer", &self.inner.renderer)
            .field("notifier", &self.inner.notifier.is_some())
            .field("settings", &self.inner.settings)
            .field("prefetched_keys", &self.inner.rendered.key_count())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        providers: ProviderSet,
        renderer: Arc<dyn Renderer>,
        batches: Arc<AssetBatches>,
        rendered: Arc<RenderedCache>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self::with_notifier(providers, renderer, None, batches, rendered, settings)
    }

    pub fn with_notifier(
        providers: ProviderSet,
        renderer: Arc<dyn Renderer>,
        notifier: Option<Arc<dyn WebhookNotifier>>,
        batches: Arc<AssetBatches>,
        rendered: Arc<RenderedCache>,
        settings: OrchestratorSettings,
    ) -> Self {
        let fetcher = AssetFetcher::new(batches)
            .with_retry_budget(settings.retry_budget)
            .with_page_size(settings.page_size);

        Self {
            inner: Arc::new(Inner {
                providers,
                renderer,
                notifier,
                fetcher,
                rendered,
                settings,
                cancel: CancellationToken::new(),
                permits: Semaphore::new(settings.max_background_tasks.max(1)),
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn rendered_cache(&self) -> &Arc<RenderedCache> {
        &self.inner.rendered
    }

    pub fn batch_cache(&self) -> &Arc<AssetBatches> {
        self.inner.fetcher.batches()
    }

    /// Starts the batch and rendered cache expiry sweeps, stopped by
    /// [`Self::shutdown`].
    pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
        [
            self.batch_cache()
                .spawn_sweeper(self.inner.cancel.child_token()),
            self.inner
                .rendered
                .spawn_sweeper(self.inner.cancel.child_token()),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Cancels background refills, webhooks and the sweepers.
    pub fn shutdown(&self) {
        info!("stopping background work");
        self.inner.cancel.cancel();
    }

    /// Next screen for the request, recorded in `history`.
    #[instrument(skip_all, fields(device = %request.device, user = %request.user))]
    pub async fn next_view(
        &self,
        request: &ViewRequest,
        history: &mut HistoryLedger,
    ) -> Result<RenderedView> {
        let key = request.cache_key();

        if let Some(view) = self.inner.rendered.pop(&key) {
            debug!(key = %key, "serving prefetched view");
            history.push(&view.history_entry());
            self.notify(WebhookEvent::AssetNew, &request.device, &view);
            if request.prefetch {
                self.schedule_refill(request.clone(), key);
            }
            return Ok(view);
        }

        debug!(key = %key, "no prefetched view, building synchronously");
        let view = self.build_view(request).await?;
        history.push(&view.history_entry());
        self.notify(WebhookEvent::AssetNew, &request.device, &view);
        if request.prefetch {
            self.schedule_refill(request.clone(), key);
        }
        Ok(view)
    }

    /// Re-renders the screen shown before the current one.
    ///
    /// Returns `Ok(None)` when the ledger holds fewer than two screens. The
    /// re-rendered screen becomes the newest history entry.
    #[instrument(skip_all, fields(device = %device))]
    pub async fn previous_view(
        &self,
        device: &str,
        history: &mut HistoryLedger,
    ) -> Result<Option<RenderedView>> {
        let Previous::Available(entry) = history.previous()? else {
            debug!("not enough history to go back");
            return Ok(None);
        };

        let mut assets = Vec::with_capacity(entry.tokens().len());
        for token in entry.tokens() {
            let provider = self.inner.providers.for_user(&token.user)?;
            let asset = provider.asset(&token.asset_id).await?;
            assets.push(self.render_asset(provider.as_ref(), asset, &token.user).await?);
        }

        let view = RenderedView::new(assets);
        history.push(&view.history_entry());
        self.notify(WebhookEvent::AssetPrevious, device, &view);
        Ok(Some(view))
    }

    /// Drops every cached batch and prefetched view.
    pub fn flush(&self, device: &str) {
        self.batch_cache().flush();
        self.inner.rendered.flush();
        info!(device, "caches flushed");
        self.notify_event(WebhookEvent::CacheFlush, device);
    }

    async fn build_view(&self, request: &ViewRequest) -> Result<RenderedView> {
        let provider = self.inner.providers.for_user(&request.user)?;
        let settings = &request.settings;
        let candidates = catalog::gather(provider.as_ref(), &settings.sources).await;

        let assets = match settings.layout {
            Layout::Single => {
                let asset = self
                    .pick_and_fetch(provider.as_ref(), &candidates, request, &settings.policy)
                    .await?;
                vec![asset]
            }
            Layout::Split => {
                self.fetch_split(provider.as_ref(), &candidates, request).await?
            }
        };

        let mut rendered = Vec::with_capacity(assets.len());
        for asset in assets {
            rendered.push(
                self.render_asset(provider.as_ref(), asset, &request.user)
                    .await?,
            );
        }
        Ok(RenderedView::new(rendered))
    }

    async fn fetch_split(
        &self,
        provider: &dyn AssetProvider,
        candidates: &[WeightedCandidate],
        request: &ViewRequest,
    ) -> Result<Vec<Asset>> {
        let mut portrait = request.settings.policy.clone();
        portrait.orientation = Some(Orientation::Portrait);

        let first = match self
            .pick_and_fetch(provider, candidates, request, &portrait)
            .await
        {
            Ok(asset) => asset,
            Err(KioskError::NoAssetsFound(source)) => {
                debug!(%source, "no portrait asset, using a single layout");
                let single = self
                    .pick_and_fetch(provider, candidates, request, &request.settings.policy)
                    .await?;
                return Ok(vec![single]);
            }
            Err(err) => return Err(err),
        };

        portrait.exclude.insert(first.id.clone());
        match self
            .pick_and_fetch(provider, candidates, request, &portrait)
            .await
        {
            Ok(second) => Ok(vec![first, second]),
            Err(KioskError::NoAssetsFound(source)) => {
                debug!(%source, "no second portrait asset, using a single layout");
                Ok(vec![first])
            }
            Err(err) => Err(err),
        }
    }

    async fn pick_and_fetch(
        &self,
        provider: &dyn AssetProvider,
        candidates: &[WeightedCandidate],
        request: &ViewRequest,
        policy: &FilterPolicy,
    ) -> Result<Asset> {
        let candidate = {
            let mut rng = rand::rng();
            selector::pick(candidates, request.settings.weighting, &mut rng)
        };
        debug!(source = %candidate.source, weight = candidate.weight, "picked source");

        self.inner
            .fetcher
            .fetch(provider, &candidate, policy, &request.device, &request.user)
            .await
    }

    async fn render_asset(
        &self,
        provider: &dyn AssetProvider,
        asset: Asset,
        user: &str,
    ) -> Result<RenderedAsset> {
        let bytes = provider.preview(&asset.id).await?;
        let image = self
            .inner
            .renderer
            .render(&asset, bytes, &self.inner.settings.render)
            .await?;

        Ok(RenderedAsset {
            asset,
            user: user.to_string(),
            mime: image.mime,
            image_base64: image.image_base64,
            blurred_base64: image.blurred_base64,
        })
    }
}

#[cfg(test)]
mod tests;
