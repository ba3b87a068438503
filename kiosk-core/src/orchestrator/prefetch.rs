use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

use kiosk_model::RenderedView;
use tracing::{debug, warn};

use super::{Orchestrator, ViewRequest};
use crate::{
    cache::CacheKey,
    error::{KioskError, Result},
    webhook::{WebhookEvent, WebhookPayload},
};

/// Marks a key as having a refill in progress until dropped.
struct InFlight<'a> {
    keys: &'a Mutex<HashSet<CacheKey>>,
    key: CacheKey,
}

impl<'a> InFlight<'a> {
    fn claim(keys: &'a Mutex<HashSet<CacheKey>>, key: &CacheKey) -> Option<Self> {
        let inserted = keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        inserted.then(|| Self {
            keys,
            key: key.clone(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl Orchestrator {
    /// Queues a background build of the next view for `key`.
    ///
    /// Skipped when the queue is full or a refill for the key is already
    /// running. Failures are logged and never reach the caller.
    pub(super) fn schedule_refill(&self, request: ViewRequest, key: CacheKey) {
        if !self.inner.rendered.has_room(&key) {
            return;
        }
        if self.inner.cancel.is_cancelled() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("prefetch skipped (no Tokio runtime available)");
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            let Some(_guard) = InFlight::claim(&this.inner.in_flight, &key) else {
                debug!(key = %key, "refill already in flight");
                return;
            };

            let outcome = tokio::select! {
                _ = this.inner.cancel.cancelled() => Err(KioskError::Cancelled),
                result = this.refill(&request, &key) => result,
            };

            match outcome {
                Ok(()) => {}
                Err(KioskError::Cancelled) => debug!(key = %key, "refill cancelled"),
                Err(err) => warn!(key = %key, error = %err, "background refill failed"),
            }
        });
    }

    async fn refill(&self, request: &ViewRequest, key: &CacheKey) -> Result<()> {
        let _permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|_| KioskError::Cancelled)?;

        let view = self.build_view(request).await?;
        let event_view = view.clone();
        if self.inner.rendered.push(key.clone(), view) {
            debug!(key = %key, "prefetched view stored");
            self.notify(WebhookEvent::AssetPrefetch, &request.device, &event_view);
        } else {
            debug!(key = %key, "prefetch queue full, dropping view");
        }
        Ok(())
    }

    pub(super) fn notify(&self, event: WebhookEvent, device: &str, view: &RenderedView) {
        if self.inner.notifier.is_some() {
            self.dispatch(WebhookPayload::for_view(event, device, view));
        }
    }

    pub(super) fn notify_event(&self, event: WebhookEvent, device: &str) {
        if self.inner.notifier.is_some() {
            self.dispatch(WebhookPayload::new(event, device));
        }
    }

    fn dispatch(&self, payload: WebhookPayload) {
        let Some(notifier) = self.inner.notifier.clone() else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_err() {
            warn!(event = %payload.event, "webhook skipped (no Tokio runtime available)");
            return;
        }

        let cancel = self.inner.cancel.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(event = %payload.event, "webhook cancelled");
                }
                _ = notifier.notify(&payload) => {}
            }
        });
    }
}
