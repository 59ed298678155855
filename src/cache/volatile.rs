//! Galaxy-wide TTL caches for activity (kills, jumps) and faction-warfare
//! status (spec.md §4.4). Three independent layers, each with its own lock,
//! so a slow `kills` refresh never blocks a `jumps` read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{ActivityRecord, FactionWarfareRecord, Freshness};
use crate::upstream::endpoints::{self, KillCounts};
use crate::upstream::UpstreamClient;

use super::layer::{classify, CacheLayer};

/// Filename for the on-disk snapshot written under
/// `config.cache_snapshot_dir` (spec.md §6 "one directory for the
/// volatile-cache snapshots"), giving the three layers a cold-start
/// recovery path instead of an empty map on every process restart.
const SNAPSHOT_FILE: &str = "volatile_snapshot.json";

#[derive(Serialize, Deserialize)]
struct LayerSnapshot<V> {
    data: HashMap<u32, V>,
    age_seconds: u64,
}

#[derive(Serialize, Deserialize, Default)]
struct VolatileSnapshot {
    kills: Option<LayerSnapshot<KillCounts>>,
    jumps: Option<LayerSnapshot<u32>>,
    faction_warfare: Option<LayerSnapshot<FactionWarfareRecord>>,
}

const KILLS_TTL: Duration = Duration::from_secs(10 * 60);
const JUMPS_TTL: Duration = Duration::from_secs(10 * 60);
const FW_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Serialize)]
pub struct LayerStatus {
    pub count: usize,
    pub age_seconds: Option<u64>,
    pub ttl_seconds: u64,
    pub stale: bool,
}

#[derive(Debug, Serialize)]
pub struct VolatileStatus {
    pub kills: LayerStatus,
    pub jumps: LayerStatus,
    pub faction_warfare: LayerStatus,
}

#[derive(Debug, Serialize)]
pub struct ActivityResult {
    pub records: HashMap<u32, ActivityRecord>,
    pub cache_age_seconds: u64,
    pub freshness: Freshness,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FwResult {
    pub records: HashMap<u32, FactionWarfareRecord>,
    pub cache_age_seconds: u64,
    pub freshness: Freshness,
    pub warnings: Vec<String>,
}

pub struct VolatileCache {
    client: Arc<UpstreamClient>,
    kills: CacheLayer<u32, KillCounts>,
    jumps: CacheLayer<u32, u32>,
    faction_warfare: CacheLayer<u32, FactionWarfareRecord>,
}

impl VolatileCache {
    pub fn new(client: Arc<UpstreamClient>) -> Self {
        Self {
            client,
            kills: CacheLayer::new(KILLS_TTL),
            jumps: CacheLayer::new(JUMPS_TTL),
            faction_warfare: CacheLayer::new(FW_TTL),
        }
    }

    /// Per-system activity. Refreshes the two independent layers, then
    /// merges them (spec.md §3 Activity record, §4.4).
    pub async fn activity(&self, system_ids: &[u32]) -> ActivityResult {
        let client = self.client.clone();
        let kills_read = self.kills.get_or_refresh(|| async move {
            endpoints::fetch_kills(&client).await
        }).await;

        let client = self.client.clone();
        let jumps_read = self.jumps.get_or_refresh(|| async move {
            endpoints::fetch_jumps(&client).await
        }).await;

        let mut records = HashMap::with_capacity(system_ids.len());
        for &sid in system_ids {
            records.insert(sid, endpoints::merge_activity(&kills_read.data, &jumps_read.data, sid));
        }

        let age = kills_read.age.max(jumps_read.age).unwrap_or(Duration::MAX);
        let mut warnings = Vec::new();
        warnings.extend(kills_read.warning);
        warnings.extend(jumps_read.warning);

        ActivityResult {
            records,
            cache_age_seconds: age.as_secs(),
            freshness: classify(Some(age), KILLS_TTL.min(JUMPS_TTL)),
            warnings,
        }
    }

    pub async fn faction_warfare(&self, system_ids: &[u32]) -> FwResult {
        let client = self.client.clone();
        let read = self.faction_warfare.get_or_refresh(|| async move {
            endpoints::fetch_faction_warfare(&client).await
        }).await;

        let mut records = HashMap::with_capacity(system_ids.len());
        for &sid in system_ids {
            if let Some(r) = read.data.get(&sid) {
                records.insert(sid, r.clone());
            }
        }

        FwResult {
            records,
            cache_age_seconds: read.age.unwrap_or(Duration::MAX).as_secs(),
            freshness: classify(read.age, FW_TTL),
            warnings: read.warning.into_iter().collect(),
        }
    }

    /// No-I/O diagnostics across all three layers (spec.md §4.4 status()).
    pub fn status(&self) -> VolatileStatus {
        let to_status = |(count, age, ttl, stale): (usize, Option<Duration>, Duration, bool)| LayerStatus {
            count,
            age_seconds: age.map(|a| a.as_secs()),
            ttl_seconds: ttl.as_secs(),
            stale,
        };
        VolatileStatus {
            kills: to_status(self.kills.status()),
            jumps: to_status(self.jumps.status()),
            faction_warfare: to_status(self.faction_warfare.status()),
        }
    }

    /// Write whatever layers have been refreshed at least once to
    /// `dir/volatile_snapshot.json`. Best-effort: a layer that's never been
    /// refreshed is simply omitted, not an error.
    pub fn save_snapshot(&self, dir: &str) -> std::io::Result<()> {
        let snapshot = VolatileSnapshot {
            kills: self.kills.export().map(|(data, age)| LayerSnapshot { data, age_seconds: age.as_secs() }),
            jumps: self.jumps.export().map(|(data, age)| LayerSnapshot { data, age_seconds: age.as_secs() }),
            faction_warfare: self
                .faction_warfare
                .export()
                .map(|(data, age)| LayerSnapshot { data, age_seconds: age.as_secs() }),
        };
        std::fs::create_dir_all(dir)?;
        let path = std::path::Path::new(dir).join(SNAPSHOT_FILE);
        let bytes = serde_json::to_vec(&snapshot)?;
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), "wrote volatile cache snapshot");
        Ok(())
    }

    /// Seed the three layers from a prior snapshot, if one exists and
    /// parses; a missing or corrupt snapshot just leaves the caches cold,
    /// same as a brand-new deployment (spec.md §4.4 cold-start behavior).
    pub fn load_snapshot(&self, dir: &str) {
        let path = std::path::Path::new(dir).join(SNAPSHOT_FILE);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(_) => return,
        };
        let snapshot: VolatileSnapshot = match serde_json::from_slice(&bytes) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable volatile cache snapshot");
                return;
            }
        };
        if let Some(l) = snapshot.kills {
            self.kills.seed(l.data, Duration::from_secs(l.age_seconds));
        }
        if let Some(l) = snapshot.jumps {
            self.jumps.seed(l.data, Duration::from_secs(l.age_seconds));
        }
        if let Some(l) = snapshot.faction_warfare {
            self.faction_warfare.seed(l.data, Duration::from_secs(l.age_seconds));
        }
        debug!(path = %path.display(), "loaded volatile cache snapshot");
    }
}
