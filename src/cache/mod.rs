//! Bounded key→bytes cache with strict LRU eviction, a TTL sweep, and
//! load-on-miss from disk or network.

pub mod loader;

use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
pub use loader::{Source, SourceLoader};

/// Timeout for network loads.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

struct CacheEntry {
    data: Arc<Vec<u8>>,
    last_access: Instant,
    size: u64,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub current_bytes: u64,
    pub expired_items: u64,
    pub evicted_items: u64,
    pub file_loads: u64,
    pub network_loads: u64,
    pub load_errors: u64,
    pub total_original_bytes: u64,
    pub total_final_bytes: u64,
}

/// Lock order is always `entries` before `metrics`.
pub struct ObjectCache {
    name: String,
    entries: Mutex<LruCache<String, CacheEntry>>,
    metrics: Mutex<CacheMetrics>,
    loader: SourceLoader,
}

impl ObjectCache {
    /// A capacity of zero is treated as one.
    pub fn new(name: impl Into<String>, capacity: usize, base_dir: Option<PathBuf>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.into(),
            entries: Mutex::new(LruCache::new(capacity)),
            metrics: Mutex::new(CacheMetrics::default()),
            loader: SourceLoader::new(base_dir, NETWORK_TIMEOUT),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.lock_entries().cap().get()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_metrics(&self) -> std::sync::MutexGuard<'_, CacheMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, promoting it to most recently used on a hit.
    pub fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let mut entries = self.lock_entries();
        let found = entries.get_mut(key).map(|entry| {
            entry.last_access = Instant::now();
            Arc::clone(&entry.data)
        });

        let mut metrics = self.lock_metrics();
        if found.is_some() {
            metrics.hits += 1;
        } else {
            metrics.misses += 1;
        }
        found
    }

    /// Insert or replace `key`. At capacity the least recently used entry is
    /// evicted.
    pub fn put(&self, key: impl Into<String>, data: Vec<u8>) -> Arc<Vec<u8>> {
        self.put_at(key.into(), data, Instant::now())
    }

    fn put_at(&self, key: String, data: Vec<u8>, now: Instant) -> Arc<Vec<u8>> {
        let size = data.len() as u64;
        let data = Arc::new(data);
        let entry = CacheEntry {
            data: Arc::clone(&data),
            last_access: now,
            size,
        };

        let mut entries = self.lock_entries();
        let displaced = entries.push(key.clone(), entry);

        let mut metrics = self.lock_metrics();
        if let Some((old_key, old)) = displaced {
            metrics.current_bytes = metrics.current_bytes.saturating_sub(old.size);
            if old_key != key {
                metrics.evicted_items += 1;
                debug!(cache = %self.name, key = %old_key, "Evicted least recently used entry");
            }
        }
        metrics.current_bytes += size;
        data
    }

    /// Drop `key`. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.lock_entries();
        match entries.pop(key) {
            Some(entry) => {
                let mut metrics = self.lock_metrics();
                metrics.current_bytes = metrics.current_bytes.saturating_sub(entry.size);
                true
            }
            None => false,
        }
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.lock_metrics().clone()
    }

    /// Evict every entry not accessed within `ttl`. Returns the number evicted.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        self.sweep_expired_at(Instant::now(), ttl)
    }

    fn sweep_expired_at(&self, now: Instant, ttl: Duration) -> usize {
        let mut entries = self.lock_entries();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_access) > ttl)
            .map(|(key, _)| key.clone())
            .collect();

        if expired.is_empty() {
            return 0;
        }

        let mut freed = 0u64;
        for key in &expired {
            if let Some(entry) = entries.pop(key) {
                freed += entry.size;
            }
        }

        let mut metrics = self.lock_metrics();
        metrics.current_bytes = metrics.current_bytes.saturating_sub(freed);
        metrics.expired_items += expired.len() as u64;

        debug!(cache = %self.name, count = expired.len(), freed, "Swept expired entries");
        expired.len()
    }

    /// Run `sweep_expired(ttl)` every `interval` until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        ttl: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(cache = %cache.name, "Sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.sweep_expired(ttl);
                    }
                }
            }
        })
    }

    /// Return the cached bytes for `key`, loading them on a miss.
    pub async fn load(&self, key: &str, cancel: &CancellationToken) -> Result<Arc<Vec<u8>>> {
        if let Some(data) = self.get(key) {
            return Ok(data);
        }

        let source = match self.loader.classify(key) {
            Ok(source) => source,
            Err(e) => {
                self.lock_metrics().load_errors += 1;
                warn!(cache = %self.name, key, error = %e, "Rejected cache key");
                return Err(e);
            }
        };
        let loader = self.loader.clone();
        let blocking_source = source.clone();
        let handle = tokio::task::spawn_blocking(move || loader.load(&blocking_source));

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(StoreError::Cancelled),
            joined = handle => joined.unwrap_or_else(|e| {
                Err(StoreError::Unsupported(format!("loader task failed: {}", e)))
            }),
        };

        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                self.lock_metrics().load_errors += 1;
                warn!(cache = %self.name, key, error = %e, "Failed to load object");
                return Err(e);
            }
        };

        {
            let mut metrics = self.lock_metrics();
            match source {
                Source::Network(_) => metrics.network_loads += 1,
                _ => metrics.file_loads += 1,
            }
            metrics.total_original_bytes += loaded.original_size;
            metrics.total_final_bytes += loaded.data.len() as u64;
        }

        Ok(self.put(key, loaded.data))
    }

    pub fn log_summary(&self) {
        let m = self.metrics();
        info!(
            cache = %self.name,
            entries = self.len(),
            hits = m.hits,
            misses = m.misses,
            bytes = m.current_bytes,
            evicted = m.evicted_items,
            expired = m.expired_items,
            "Cache summary"
        );
    }
}
