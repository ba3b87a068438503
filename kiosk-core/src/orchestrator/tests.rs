use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use kiosk_model::{AssetId, AssetKind, PersonId};

use super::*;
use crate::{
    cache::{CacheSettings, RenderedCacheSettings},
    error::ProviderError,
    provider::BatchQuery,
    render::RenderedImage,
};

/// Library of numbered images; every batch request returns all of them in
/// order.
#[derive(Debug)]
struct LibraryProvider {
    assets: Vec<Asset>,
    batch_calls: AtomicUsize,
}

impl LibraryProvider {
    fn with_images(count: usize) -> Self {
        Self::new((0..count).map(|n| Asset::image(format!("img-{n}"))).collect())
    }

    fn new(assets: Vec<Asset>) -> Self {
        Self {
            assets,
            batch_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AssetProvider for LibraryProvider {
    async fn count(&self, source: &Source) -> Result<u64> {
        Ok(match source {
            Source::Person(id) => self
                .assets
                .iter()
                .filter(|a| a.features_person(id))
                .count() as u64,
            _ => self.assets.len() as u64,
        })
    }

    async fn random_batch(&self, _query: &BatchQuery) -> Result<Vec<Asset>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.assets.clone())
    }

    async fn asset(&self, id: &AssetId) -> Result<Asset> {
        self.assets
            .iter()
            .find(|a| &a.id == id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(id.to_string()).into())
    }

    async fn preview(&self, id: &AssetId) -> Result<Vec<u8>> {
        Ok(id.as_str().as_bytes().to_vec())
    }
}

/// Echoes the preview bytes back as the "image".
#[derive(Debug)]
struct EchoRenderer;

#[async_trait]
impl Renderer for EchoRenderer {
    async fn render(
        &self,
        _asset: &Asset,
        bytes: Vec<u8>,
        _settings: &RenderSettings,
    ) -> Result<RenderedImage> {
        Ok(RenderedImage {
            mime: "image/test".into(),
            image_base64: String::from_utf8_lossy(&bytes).into_owned(),
            blurred_base64: String::new(),
        })
    }
}

/// Renders `budget` screens, then fails until the budget is topped up.
#[derive(Debug)]
struct FlakyRenderer {
    budget: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakyRenderer {
    fn with_budget(budget: usize) -> Self {
        Self {
            budget: AtomicUsize::new(budget),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Renderer for FlakyRenderer {
    async fn render(
        &self,
        asset: &Asset,
        bytes: Vec<u8>,
        settings: &RenderSettings,
    ) -> Result<RenderedImage> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let spent = self
            .budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if spent.is_err() {
            return Err(KioskError::Render("decoder unavailable".into()));
        }
        EchoRenderer.render(asset, bytes, settings).await
    }
}

#[derive(Debug, Default)]
struct RecordingNotifier {
    events: Mutex<Vec<WebhookEvent>>,
}

#[async_trait]
impl WebhookNotifier for RecordingNotifier {
    async fn notify(&self, payload: &crate::webhook::WebhookPayload) {
        self.events.lock().unwrap().push(payload.event);
    }
}

fn orchestrator(provider: Arc<LibraryProvider>) -> Orchestrator {
    Orchestrator::new(
        ProviderSet::new(provider),
        Arc::new(EchoRenderer),
        Arc::new(AssetBatches::new(CacheSettings::default())),
        Arc::new(RenderedCache::new(RenderedCacheSettings::default())),
        OrchestratorSettings::default(),
    )
}

fn request(device: &str) -> ViewRequest {
    ViewRequest {
        view_query: CanonicalQuery::from_pairs([("layout", "single")]),
        device: device.into(),
        user: String::new(),
        settings: ViewSettings::default(),
        prefetch: true,
    }
}

fn ids(view: &RenderedView) -> Vec<&str> {
    view.assets.iter().map(|a| a.asset.id.as_str()).collect()
}

async fn wait_for_prefetch(orchestrator: &Orchestrator, key: &CacheKey) {
    for _ in 0..200 {
        if orchestrator.rendered_cache().len(key) > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("prefetch never completed");
}

#[tokio::test]
async fn miss_builds_then_hit_serves_the_prefetched_view() {
    let provider = Arc::new(LibraryProvider::with_images(5));
    let orchestrator = orchestrator(Arc::clone(&provider));
    let request = request("kitchen");
    let mut history = HistoryLedger::default();

    let first = orchestrator.next_view(&request, &mut history).await.unwrap();
    assert_eq!(ids(&first), vec!["img-0"]);
    assert_eq!(first.assets[0].image_base64, "img-0");

    wait_for_prefetch(&orchestrator, &request.cache_key()).await;

    let second = orchestrator.next_view(&request, &mut history).await.unwrap();
    assert_eq!(ids(&second), vec!["img-1"]);
    assert_eq!(history.entries().collect::<Vec<_>>(), vec!["img-0:", "img-1:"]);
    assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
    orchestrator.shutdown();
}

#[tokio::test]
async fn previous_rerenders_the_earlier_screen() {
    let provider = Arc::new(LibraryProvider::with_images(3));
    let orchestrator = orchestrator(provider);
    let request = request("hallway");
    let mut history = HistoryLedger::default();

    orchestrator.next_view(&request, &mut history).await.unwrap();
    wait_for_prefetch(&orchestrator, &request.cache_key()).await;
    orchestrator.next_view(&request, &mut history).await.unwrap();
    assert_eq!(history.len(), 2);

    let back = orchestrator
        .previous_view("hallway", &mut history)
        .await
        .unwrap()
        .expect("an earlier screen");
    assert_eq!(ids(&back), vec!["img-0"]);
    assert_eq!(history.entries().collect::<Vec<_>>(), vec!["img-0:"]);

    assert!(
        orchestrator
            .previous_view("hallway", &mut history)
            .await
            .unwrap()
            .is_none()
    );
    orchestrator.shutdown();
}

#[tokio::test]
async fn split_layout_pairs_distinct_portraits() {
    let mut assets: Vec<Asset> = (0..4)
        .map(|n| {
            let mut asset = Asset::image(format!("p-{n}"));
            asset.orientation = Orientation::Portrait;
            asset
        })
        .collect();
    let mut wide = Asset::image("wide");
    wide.orientation = Orientation::Landscape;
    assets.insert(0, wide);

    let orchestrator = orchestrator(Arc::new(LibraryProvider::new(assets)));
    let mut request = request("lounge");
    request.settings.layout = Layout::Split;

    let view = orchestrator
        .next_view(&request, &mut HistoryLedger::default())
        .await
        .unwrap();

    assert_eq!(ids(&view), vec!["p-0", "p-1"]);
    assert_eq!(view.history_entry().to_string(), "p-0:,p-1:");
    orchestrator.shutdown();
}

#[tokio::test]
async fn split_layout_falls_back_to_a_single_asset() {
    let mut wide = Asset::image("wide");
    wide.orientation = Orientation::Landscape;
    let orchestrator = orchestrator(Arc::new(LibraryProvider::new(vec![wide])));
    let mut request = request("lounge");
    request.settings.layout = Layout::Split;

    let view = orchestrator
        .next_view(&request, &mut HistoryLedger::default())
        .await
        .unwrap();
    assert_eq!(ids(&view), vec!["wide"]);
    orchestrator.shutdown();
}

#[tokio::test]
async fn empty_library_reports_no_assets() {
    let orchestrator = orchestrator(Arc::new(LibraryProvider::new(Vec::new())));
    let mut history = HistoryLedger::default();

    let err = orchestrator
        .next_view(&request("kitchen"), &mut history)
        .await
        .unwrap_err();

    assert!(matches!(err, KioskError::NoAssetsFound(Source::Library)));
    assert!(history.is_empty());
    orchestrator.shutdown();
}

#[tokio::test]
async fn person_source_only_yields_that_person() {
    let mut tagged = Asset::image("with-ada");
    tagged.people.push(PersonId::new("ada"));
    let mut video = Asset::image("ada-video");
    video.kind = AssetKind::Video;
    video.people.push(PersonId::new("ada"));
    let provider = LibraryProvider::new(vec![Asset::image("nobody"), video, tagged]);

    let orchestrator = orchestrator(Arc::new(provider));
    let mut request = request("kitchen");
    request.settings.sources = vec![Source::Person(PersonId::new("ada"))];

    let view = orchestrator
        .next_view(&request, &mut HistoryLedger::default())
        .await
        .unwrap();
    assert_eq!(ids(&view), vec!["with-ada"]);
    orchestrator.shutdown();
}

#[tokio::test]
async fn flush_drops_both_caches_and_notifies() {
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = Orchestrator::with_notifier(
        ProviderSet::new(Arc::new(LibraryProvider::with_images(4))),
        Arc::new(EchoRenderer),
        Some(notifier.clone() as Arc<dyn WebhookNotifier>),
        Arc::new(AssetBatches::default()),
        Arc::new(RenderedCache::default()),
        OrchestratorSettings::default(),
    );
    let request = request("kitchen");

    orchestrator
        .next_view(&request, &mut HistoryLedger::default())
        .await
        .unwrap();
    wait_for_prefetch(&orchestrator, &request.cache_key()).await;
    assert_eq!(orchestrator.batch_cache().count(), 1);

    orchestrator.flush("kitchen");
    assert_eq!(orchestrator.batch_cache().count(), 0);
    assert_eq!(orchestrator.rendered_cache().key_count(), 0);

    let expected = [
        WebhookEvent::AssetNew,
        WebhookEvent::AssetPrefetch,
        WebhookEvent::CacheFlush,
    ];
    for _ in 0..200 {
        let events = notifier.events.lock().unwrap().clone();
        if expected.iter().all(|event| events.contains(event)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let events = notifier.events.lock().unwrap().clone();
    for event in expected {
        assert!(events.contains(&event), "missing {event}");
    }
    orchestrator.shutdown();
}

#[tokio::test]
async fn unknown_user_is_a_config_error() {
    let orchestrator = orchestrator(Arc::new(LibraryProvider::with_images(1)));
    let mut request = request("kitchen");
    request.user = "ghost".into();

    let err = orchestrator
        .next_view(&request, &mut HistoryLedger::default())
        .await
        .unwrap_err();
    assert!(matches!(err, KioskError::Config(_)));
}

#[tokio::test]
async fn failed_refill_leaves_queue_empty_and_is_retried_later() {
    let renderer = Arc::new(FlakyRenderer::with_budget(1));
    let orchestrator = Orchestrator::new(
        ProviderSet::new(Arc::new(LibraryProvider::with_images(5))),
        renderer.clone(),
        Arc::new(AssetBatches::default()),
        Arc::new(RenderedCache::default()),
        OrchestratorSettings::default(),
    );
    let request = request("kitchen");
    let key = request.cache_key();
    let mut history = HistoryLedger::default();

    let first = orchestrator.next_view(&request, &mut history).await.unwrap();
    assert_eq!(ids(&first), vec!["img-0"]);

    for _ in 0..200 {
        if renderer.attempts.load(Ordering::SeqCst) >= 2
            && orchestrator.inner.in_flight.lock().unwrap().is_empty()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(renderer.attempts.load(Ordering::SeqCst), 2);
    assert!(orchestrator.inner.in_flight.lock().unwrap().is_empty());
    assert_eq!(orchestrator.rendered_cache().len(&key), 0);
    assert_eq!(orchestrator.rendered_cache().key_count(), 0);

    // No prefetched view, so the caller sees the render failure itself.
    let err = orchestrator.next_view(&request, &mut history).await.unwrap_err();
    assert!(matches!(err, KioskError::Render(_)));
    assert_eq!(history.len(), 1);

    renderer.budget.store(10, Ordering::SeqCst);
    orchestrator.next_view(&request, &mut history).await.unwrap();
    assert_eq!(history.len(), 2);
    wait_for_prefetch(&orchestrator, &key).await;
    orchestrator.shutdown();
}

#[tokio::test]
async fn requests_without_prefetch_leave_no_queue_behind() {
    let orchestrator = orchestrator(Arc::new(LibraryProvider::with_images(5)));
    let mut history = HistoryLedger::default();

    for n in 0..10 {
        let mut request = request(&format!("anonymous-{n}"));
        request.prefetch = false;
        orchestrator.next_view(&request, &mut history).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(orchestrator.rendered_cache().key_count(), 0);
    orchestrator.shutdown();
}

#[tokio::test]
async fn maintenance_reclaims_abandoned_prefetch_queues() {
    let orchestrator = Orchestrator::new(
        ProviderSet::new(Arc::new(LibraryProvider::with_images(5))),
        Arc::new(EchoRenderer),
        Arc::new(AssetBatches::new(CacheSettings::default())),
        Arc::new(RenderedCache::new(RenderedCacheSettings {
            max_age: Duration::from_millis(20),
            sweep_interval: Duration::from_millis(10),
            ..Default::default()
        })),
        OrchestratorSettings::default(),
    );

    for n in 0..10 {
        let request = request(&format!("device-{n}"));
        orchestrator
            .next_view(&request, &mut HistoryLedger::default())
            .await
            .unwrap();
        wait_for_prefetch(&orchestrator, &request.cache_key()).await;
    }
    assert_eq!(orchestrator.rendered_cache().key_count(), 10);

    let handles = orchestrator.spawn_maintenance();
    assert_eq!(handles.len(), 2);
    for _ in 0..200 {
        if orchestrator.rendered_cache().key_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(orchestrator.rendered_cache().key_count(), 0);

    orchestrator.shutdown();
    for handle in handles {
        handle.await.unwrap();
    }
}
