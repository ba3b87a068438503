use std::{collections::VecDeque, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kiosk_model::RenderedView;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::key::CacheKey;

#[derive(Debug, Clone, Copy)]
pub struct RenderedCacheSettings {
    pub enabled: bool,
    /// Prefetched views kept per key.
    pub depth: usize,
    /// Views older than this are discarded instead of served.
    pub max_age: Duration,
    /// How often the background sweeper drops stale views.
    pub sweep_interval: Duration,
}

impl Default for RenderedCacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            depth: 1,
            max_age: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Per-(request, device) FIFO of fully rendered views.
///
/// Views are pushed in generation order and popped in the same order; a key
/// is removed once its queue drains.
#[derive(Debug, Default)]
pub struct RenderedCache {
    settings: RenderedCacheSettings,
    queues: DashMap<CacheKey, VecDeque<RenderedView>>,
}

impl RenderedCache {
    pub fn new(settings: RenderedCacheSettings) -> Self {
        Self {
            settings,
            queues: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &RenderedCacheSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled && self.settings.depth > 0
    }

    /// Appends a view unless the queue is already at depth. Returns whether
    /// the view was stored.
    pub fn push(&self, key: CacheKey, view: RenderedView) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut queue = self.queues.entry(key).or_default();
        if queue.len() >= self.settings.depth {
            return false;
        }
        queue.push_back(view);
        true
    }

    fn is_fresh(&self, view: &RenderedView, now: DateTime<Utc>) -> bool {
        let max_age = chrono::Duration::from_std(self.settings.max_age)
            .unwrap_or(chrono::Duration::MAX);
        now - view.created_at <= max_age
    }

    /// Pops the oldest fresh view for `key`, dropping stale ones on the way.
    pub fn pop(&self, key: &CacheKey) -> Option<RenderedView> {
        if !self.is_enabled() {
            return None;
        }
        let now = Utc::now();

        let popped = {
            let mut queue = self.queues.get_mut(key)?;
            let mut popped = None;
            while let Some(view) = queue.pop_front() {
                if self.is_fresh(&view, now) {
                    popped = Some(view);
                    break;
                }
                debug!(key = %key, "discarding stale prefetched view");
            }
            popped
        };

        self.queues.remove_if(key, |_, queue| queue.is_empty());
        popped
    }

    pub fn len(&self, key: &CacheKey) -> usize {
        self.queues.get(key).map(|q| q.len()).unwrap_or(0)
    }

    /// Whether another prefetched view fits under `key`.
    pub fn has_room(&self, key: &CacheKey) -> bool {
        self.is_enabled() && self.len(key) < self.settings.depth
    }

    pub fn key_count(&self) -> usize {
        self.queues.len()
    }

    pub fn flush(&self) {
        self.queues.clear();
    }

    /// Drops stale views under every key and removes keys left empty.
    /// Returns how many views were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut dropped = 0;
        self.queues.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|view| self.is_fresh(view, now));
            dropped += before - queue.len();
            !queue.is_empty()
        });
        dropped
    }

    /// Starts the periodic stale-view sweep. The task stops when `cancel`
    /// fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            return None;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("rendered cache sweeper not started (no Tokio runtime available)");
            return None;
        }

        let cache = Arc::clone(self);
        let period = self.settings.sweep_interval.max(Duration::from_millis(10));
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            debug!(purged, "rendered cache sweep");
                        }
                    }
                }
            }
        }))
    }
}
