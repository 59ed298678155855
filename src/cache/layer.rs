//! The generic per-layer TTL cache protocol shared by the volatile-data and
//! market caches (spec.md §4.4 / §5): check freshness → acquire lock →
//! recheck → refresh-or-serve-stale → release. Reads never take a lock;
//! only a refresh does, and refreshes are serialized per layer so a slow
//! layer never blocks an unrelated one (spec.md §4.4 Concurrency).

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::RwLock as SyncRwLock;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::error::ToolError;
use crate::types::Freshness;

/// Outcome of a `get_or_refresh` call: the data (possibly stale), its age
/// (`None` only on a cold start with no prior data), whether it's stale, and
/// a human warning when a refresh failed and the cache degraded to
/// last-known-good (spec.md §4.4 Failure policy).
pub struct LayerRead<K, V> {
    pub data: HashMap<K, V>,
    pub age: Option<Duration>,
    pub stale: bool,
    pub warning: Option<String>,
}

pub struct CacheLayer<K, V> {
    data: SyncRwLock<HashMap<K, V>>,
    last_refresh: SyncRwLock<Option<Instant>>,
    refresh_lock: AsyncMutex<()>,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> CacheLayer<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            data: SyncRwLock::new(HashMap::new()),
            last_refresh: SyncRwLock::new(None),
            refresh_lock: AsyncMutex::new(()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn age(&self) -> Option<Duration> {
        self.last_refresh.read().map(|t| t.elapsed())
    }

    fn is_stale(&self) -> bool {
        self.age().map(|a| a >= self.ttl).unwrap_or(true)
    }

    /// No-I/O diagnostics: count, age, TTL, staleness (spec.md §4.4 status()).
    pub fn status(&self) -> (usize, Option<Duration>, Duration, bool) {
        (self.data.read().len(), self.age(), self.ttl, self.is_stale())
    }

    /// Raw contents plus age for disk snapshotting (spec.md §6 cache
    /// snapshot directory); `None` means never refreshed, nothing to save.
    pub fn export(&self) -> Option<(HashMap<K, V>, Duration)> {
        let age = self.age()?;
        Some((self.data.read().clone(), age))
    }

    /// Seed a layer from a loaded snapshot, backdating `last_refresh` by
    /// `age` so a stale snapshot is still treated as stale on load instead
    /// of masquerading as a fresh refresh.
    pub fn seed(&self, data: HashMap<K, V>, age: Duration) {
        *self.data.write() = data;
        *self.last_refresh.write() = Some(Instant::now() - age);
    }

    fn snapshot(&self) -> LayerRead<K, V> {
        LayerRead {
            data: self.data.read().clone(),
            age: self.age(),
            stale: self.is_stale(),
            warning: None,
        }
    }

    /// Fetch fresh data if stale, serving stale-on-error otherwise
    /// (spec.md §4.4 Refresh protocol / Failure policy).
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> LayerRead<K, V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HashMap<K, V>, ToolError>>,
    {
        if !self.is_stale() {
            return self.snapshot();
        }

        let _guard = self.refresh_lock.lock().await;
        // Recheck: another caller may have refreshed while we waited for
        // the lock, making exactly one upstream call per refresh window.
        if !self.is_stale() {
            return self.snapshot();
        }

        match refresh().await {
            Ok(fresh) => {
                *self.data.write() = fresh.clone();
                *self.last_refresh.write() = Some(Instant::now());
                LayerRead {
                    data: fresh,
                    age: Some(Duration::ZERO),
                    stale: false,
                    warning: None,
                }
            }
            Err(e) => {
                let had_data = self.last_refresh.read().is_some();
                if had_data {
                    let mut snap = self.snapshot();
                    snap.stale = true;
                    snap.warning = Some(format!("upstream refresh failed, serving stale data: {e}"));
                    snap
                } else {
                    LayerRead {
                        data: HashMap::new(),
                        age: None,
                        stale: true,
                        warning: Some(format!("upstream unavailable and no cached data yet: {e}")),
                    }
                }
            }
        }
    }
}

/// Classify age against the three documented bands (spec.md §4.5 table);
/// layers without a documented two-tier split just use fresh/stale.
pub fn classify(age: Option<Duration>, ttl: Duration) -> Freshness {
    match age {
        None => Freshness::Stale,
        Some(a) if a < ttl / 2 => Freshness::Fresh,
        Some(a) if a < ttl => Freshness::Recent,
        Some(_) => Freshness::Stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fresh_read_does_no_io() {
        let layer: CacheLayer<u32, u32> = CacheLayer::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        layer
            .get_or_refresh(|| async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(HashMap::from([(1, 10)]))
            })
            .await;

        let c2 = calls.clone();
        let read = layer
            .get_or_refresh(|| async move {
                c2.fetch_add(1, Ordering::SeqCst);
                Ok(HashMap::new())
            })
            .await;
        assert!(!read.stale);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_with_prior_data_serves_stale() {
        let layer: CacheLayer<u32, u32> = CacheLayer::new(Duration::from_millis(1));
        layer
            .get_or_refresh(|| async { Ok(HashMap::from([(1, 10)])) })
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let read = layer
            .get_or_refresh(|| async { Err(ToolError::internal("down")) })
            .await;
        assert!(read.stale);
        assert_eq!(read.data.get(&1), Some(&10));
        assert!(read.warning.is_some());
    }

    #[tokio::test]
    async fn cold_start_with_upstream_down_returns_empty_with_marker() {
        let layer: CacheLayer<u32, u32> = CacheLayer::new(Duration::from_secs(60));
        let read = layer
            .get_or_refresh(|| async { Err(ToolError::internal("down")) })
            .await;
        assert!(read.stale);
        assert!(read.data.is_empty());
        assert!(read.warning.is_some());
    }
}
