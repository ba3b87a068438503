use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::key::CacheKey;

/// Expiry tuning for [`BatchCache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Lifetime of an entry after its last write.
    pub ttl: Duration,
    /// How often the background sweeper drops expired entries.
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// A cached value failed validation on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheCorruption {
    pub reason: String,
}

impl CacheCorruption {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CacheCorruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache corruption: {}", self.reason)
    }
}

/// Result of [`BatchCache::take_first`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeOutcome<T> {
    /// A matching item was removed from the stored batch.
    Taken(T),
    /// The key exists but nothing in it matches.
    Exhausted,
    /// No live entry for the key.
    Missing,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// TTL key/value store for raw candidate batches.
///
/// A single coarse lock guards the map; every operation is O(batch size) and
/// far less frequent than client requests. When disabled every read misses
/// and every write is dropped.
pub struct BatchCache<V> {
    settings: CacheSettings,
    entries: Mutex<HashMap<CacheKey, Entry<V>>>,
}

impl<V> fmt::Debug for BatchCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchCache")
            .field("settings", &self.settings)
            .field("entries", &self.lock().len())
            .finish()
    }
}

impl<V> Default for BatchCache<V> {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl<V> BatchCache<V> {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry<V>>> {
        // A panic while holding the lock leaves the map structurally intact.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expiry(&self) -> Instant {
        Instant::now() + self.settings.ttl
    }

    pub fn set(&self, key: CacheKey, value: V) {
        if !self.is_enabled() {
            return;
        }
        let expires_at = self.expiry();
        self.lock().insert(key, Entry { value, expires_at });
    }

    /// Overwrites a live entry, leaving absent or expired keys untouched.
    /// Returns whether the write happened.
    pub fn replace(&self, key: &CacheKey, value: V) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let now = Instant::now();
        let expires_at = self.expiry();
        let mut entries = self.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.value = value;
                entry.expires_at = expires_at;
                true
            }
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn delete(&self, key: &CacheKey) {
        self.lock().remove(key);
    }

    pub fn flush(&self) {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "batch cache flushed");
    }

    /// Number of live entries.
    pub fn count(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        self.lock().get(key).is_some_and(|e| e.is_live(now))
    }

    /// Checks a live entry with `validate`; an entry that fails is purged and
    /// reported as absent.
    pub fn contains_valid<F>(&self, key: &CacheKey, validate: F) -> bool
    where
        F: FnOnce(&V) -> Result<(), CacheCorruption>,
    {
        let now = Instant::now();
        let mut entries = self.lock();
        let verdict = match entries.get(key) {
            Some(entry) if entry.is_live(now) => validate(&entry.value),
            Some(_) => {
                entries.remove(key);
                return false;
            }
            None => return false,
        };

        match verdict {
            Ok(()) => true,
            Err(corruption) => {
                warn!(key = %key, %corruption, "purging corrupt cache entry");
                entries.remove(key);
                false
            }
        }
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

impl<V: Clone> BatchCache<V> {
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl<T: Clone> BatchCache<Vec<T>> {
    /// Removes and returns the first item satisfying `accept`, writing the
    /// shrunk batch back under the same lock so no concurrent caller can
    /// observe the item between the scan and the write.
    pub fn take_first<F>(&self, key: &CacheKey, mut accept: F) -> TakeOutcome<T>
    where
        F: FnMut(&T) -> bool,
    {
        if !self.is_enabled() {
            return TakeOutcome::Missing;
        }
        let now = Instant::now();
        let expires_at = self.expiry();
        let mut entries = self.lock();

        let Some(entry) = entries.get_mut(key) else {
            return TakeOutcome::Missing;
        };
        if !entry.is_live(now) {
            entries.remove(key);
            return TakeOutcome::Missing;
        }

        match entry.value.iter().position(&mut accept) {
            Some(idx) => {
                let item = entry.value.remove(idx);
                entry.expires_at = expires_at;
                TakeOutcome::Taken(item)
            }
            None => TakeOutcome::Exhausted,
        }
    }
}

impl<V: Send + 'static> BatchCache<V> {
    /// Starts the periodic expiry sweep. The task stops when `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            return None;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("batch cache sweeper not started (no Tokio runtime available)");
            return None;
        }

        let cache = Arc::clone(self);
        let period = self.settings.sweep_interval.max(Duration::from_secs(1));
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            debug!(purged, "batch cache sweep");
                        }
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::CanonicalQuery;

    fn key(name: &str) -> CacheKey {
        CacheKey::new(&CanonicalQuery::from_pairs([("k", name)]), "dev", "")
    }

    fn short_lived() -> BatchCache<Vec<&'static str>> {
        BatchCache::new(CacheSettings {
            enabled: true,
            ttl: Duration::from_millis(30),
            sweep_interval: Duration::from_secs(1),
        })
    }

    #[test]
    fn take_first_shrinks_the_stored_batch() {
        let cache = BatchCache::default();
        let k = key("a");
        cache.set(k.clone(), vec!["x", "y", "z"]);

        assert_eq!(cache.take_first(&k, |v| *v == "y"), TakeOutcome::Taken("y"));
        assert_eq!(cache.get(&k), Some(vec!["x", "z"]));
        assert_eq!(cache.take_first(&k, |v| *v == "y"), TakeOutcome::Exhausted);
        assert_eq!(cache.take_first(&key("b"), |_| true), TakeOutcome::Missing);
    }

    #[test]
    fn replace_is_a_no_op_for_absent_keys() {
        let cache = BatchCache::default();
        assert!(!cache.replace(&key("a"), vec!["x"]));
        assert_eq!(cache.count(), 0);

        cache.set(key("a"), vec!["x"]);
        assert!(cache.replace(&key("a"), vec!["y"]));
        assert_eq!(cache.get(&key("a")), Some(vec!["y"]));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = short_lived();
        cache.set(key("a"), vec!["x"]);
        cache.set(key("b"), vec!["y"]);
        assert_eq!(cache.count(), 2);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.get(&key("a")), None);
        assert_eq!(cache.purge_expired(), 1);
    }

    #[test]
    fn disabled_cache_never_stores() {
        let cache: BatchCache<Vec<&str>> = BatchCache::new(CacheSettings {
            enabled: false,
            ..CacheSettings::default()
        });
        cache.set(key("a"), vec!["x"]);
        assert_eq!(cache.get(&key("a")), None);
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.take_first(&key("a"), |_| true), TakeOutcome::Missing);
    }

    #[test]
    fn corrupt_entries_are_purged() {
        let cache = BatchCache::default();
        cache.set(key("a"), vec![""]);
        let valid = cache.contains_valid(&key("a"), |batch| {
            if batch.iter().any(|v| v.is_empty()) {
                Err(CacheCorruption::new("empty id"))
            } else {
                Ok(())
            }
        });
        assert!(!valid);
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn flush_and_delete_remove_entries() {
        let cache = BatchCache::default();
        cache.set(key("a"), vec!["x"]);
        cache.set(key("b"), vec!["y"]);
        cache.delete(&key("a"));
        assert_eq!(cache.count(), 1);
        cache.flush();
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn concurrent_takers_never_share_an_item() {
        let cache = Arc::new(BatchCache::default());
        let k = key("shared");
        cache.set(k.clone(), (0..200).collect::<Vec<u32>>());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let k = k.clone();
                std::thread::spawn(move || {
                    let mut taken = Vec::new();
                    while let TakeOutcome::Taken(v) = cache.take_first(&k, |_| true) {
                        taken.push(v);
                    }
                    taken
                })
            })
            .collect();

        let mut all: Vec<u32> =
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..200).collect::<Vec<_>>());
    }
}
