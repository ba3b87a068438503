//! Outbound notifications about what a display is showing.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use kiosk_model::RenderedView;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ProviderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WebhookEvent {
    #[serde(rename = "asset.new")]
    AssetNew,
    #[serde(rename = "asset.prefetch")]
    AssetPrefetch,
    #[serde(rename = "asset.previous")]
    AssetPrevious,
    #[serde(rename = "cache.flush")]
    CacheFlush,
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WebhookEvent::AssetNew => "asset.new",
            WebhookEvent::AssetPrefetch => "asset.prefetch",
            WebhookEvent::AssetPrevious => "asset.previous",
            WebhookEvent::CacheFlush => "cache.flush",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAsset {
    pub id: String,
    pub user: String,
    pub original_file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub event: WebhookEvent,
    pub device: String,
    pub assets: Vec<WebhookAsset>,
    pub timestamp: DateTime<Utc>,
}

impl WebhookPayload {
    pub fn new(event: WebhookEvent, device: impl Into<String>) -> Self {
        Self {
            event,
            device: device.into(),
            assets: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn for_view(
        event: WebhookEvent,
        device: impl Into<String>,
        view: &RenderedView,
    ) -> Self {
        let mut payload = Self::new(event, device);
        payload.assets = view
            .assets
            .iter()
            .map(|rendered| WebhookAsset {
                id: rendered.asset.id.to_string(),
                user: rendered.user.clone(),
                original_file_name: rendered.asset.original_file_name.clone(),
            })
            .collect();
        payload
    }
}

/// Fire-and-forget delivery of [`WebhookPayload`]s. Implementations log
/// failures instead of returning them.
#[async_trait]
pub trait WebhookNotifier: Send + Sync + fmt::Debug {
    async fn notify(&self, payload: &WebhookPayload);
}

/// Posts every payload as JSON to each configured URL.
#[derive(Debug, Clone)]
pub struct HttpWebhookNotifier {
    http: reqwest::Client,
    urls: Vec<Url>,
}

impl HttpWebhookNotifier {
    pub fn new(urls: Vec<Url>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::from)?;
        Ok(Self { http, urls })
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    async fn deliver(&self, url: &Url, payload: &WebhookPayload) {
        let result = self
            .http
            .post(url.clone())
            .json(payload)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => debug!(%url, event = %payload.event, "webhook delivered"),
            Err(err) => warn!(%url, event = %payload.event, error = %err, "webhook delivery failed"),
        }
    }
}

#[async_trait]
impl WebhookNotifier for HttpWebhookNotifier {
    async fn notify(&self, payload: &WebhookPayload) {
        join_all(self.urls.iter().map(|url| self.deliver(url, payload))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_model::{Asset, RenderedAsset};
    use mockito::Matcher;

    fn view() -> RenderedView {
        RenderedView::new(vec![RenderedAsset {
            asset: Asset::image("a1"),
            user: "u1".into(),
            mime: "image/jpeg".into(),
            image_base64: String::new(),
            blurred_base64: String::new(),
        }])
    }

    #[test]
    fn payload_uses_dotted_event_names() {
        let payload = WebhookPayload::for_view(WebhookEvent::AssetPrefetch, "dev", &view());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["event"], "asset.prefetch");
        assert_eq!(json["device"], "dev");
        assert_eq!(json["assets"][0]["id"], "a1");
        assert_eq!(json["assets"][0]["user"], "u1");
    }

    #[tokio::test]
    async fn posts_to_every_url_and_tolerates_failures() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJsonString(
                r#"{"event": "asset.new", "device": "kitchen"}"#.into(),
            ))
            .with_status(204)
            .create_async()
            .await;
        let failing = server
            .mock("POST", "/broken")
            .with_status(500)
            .create_async()
            .await;

        let base = Url::parse(&server.url()).unwrap();
        let notifier = HttpWebhookNotifier::new(
            vec![base.join("hook").unwrap(), base.join("broken").unwrap()],
            Duration::from_secs(2),
        )
        .unwrap();

        notifier
            .notify(&WebhookPayload::for_view(WebhookEvent::AssetNew, "kitchen", &view()))
            .await;

        ok.assert_async().await;
        failing.assert_async().await;
    }
}
