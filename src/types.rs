//! Shared domain value types (spec.md §3) used across the upstream client,
//! caches, persistent store and name resolver. These are plain data; the
//! behavior that owns them (refresh protocols, fallback chains) lives in
//! `cache` and `store`.

use serde::{Deserialize, Serialize};

/// Tri-valued freshness label attached to any cached or fetched value
/// (spec.md §3 Cache entry / GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Recent,
    Stale,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Recent => "recent",
            Freshness::Stale => "stale",
        }
    }
}

/// Per-system hourly activity counts. Absence is semantically zero
/// (spec.md §3 Activity record).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub ship_kills: u32,
    pub pod_kills: u32,
    pub npc_kills: u32,
    pub ship_jumps: u32,
}

impl ActivityRecord {
    /// A single coarse label derived from ship kills + jumps, normalized
    /// against one fixed scale (spec.md §9 Open Question: "implement a
    /// single normalization path and document the observed scale").
    /// Buckets: none(0) / low(<5) / medium(<20) / high(<50) / extreme(>=50),
    /// scored on `ship_kills*3 + pod_kills*2 + npc_kills + ship_jumps/10`.
    pub fn activity_level(&self) -> &'static str {
        let score = self.ship_kills as f64 * 3.0
            + self.pod_kills as f64 * 2.0
            + self.npc_kills as f64
            + self.ship_jumps as f64 / 10.0;
        if score <= 0.0 {
            "none"
        } else if score < 5.0 {
            "low"
        } else if score < 20.0 {
            "medium"
        } else if score < 50.0 {
            "high"
        } else {
            "extreme"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestedState {
    Uncontested,
    Contested,
    Vulnerable,
}

/// Per-system faction-warfare state (spec.md §3 Faction-warfare record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactionWarfareRecord {
    pub owner_faction: String,
    pub occupying_faction: String,
    pub contested: ContestedState,
    pub victory_points: u32,
    pub victory_points_threshold: u32,
}

/// One day of historical market activity for an item in a region
/// (spec.md §4.5 `history` action backing data).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: String,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub volume: u64,
    pub order_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Summary statistics over the order book for one (region, item, side)
/// (spec.md §3 Price aggregate). Primary key is the triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAggregate {
    pub region_id: u32,
    pub item_id: u32,
    pub side: Side,
    pub weighted_average: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub stddev: f64,
    pub volume: f64,
    pub order_count: u32,
    pub percentile: f64,
    pub last_updated: i64,
}

/// A single live order (spec.md §3 Market order). Transient — never
/// persisted across refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOrder {
    pub order_id: u64,
    pub item_id: u32,
    pub price: f64,
    pub remaining_volume: u64,
    pub total_volume: u64,
    pub location_id: u64,
    pub is_buy_order: bool,
    pub range: String,
    pub duration: u32,
    pub issued_at: String,
}

/// Static item-type reference data (spec.md §3 Item type). Populated once
/// from bulk reference; upstream-learned entries are written through on
/// first successful lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemType {
    pub id: u32,
    pub name: String,
    pub name_lower: String,
    pub group_id: u32,
    pub market_group_id: Option<u32>,
}

/// Which layer of the market fallback chain produced a price (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceSource {
    PreAggregated,
    RawOrders,
    PersistentStore,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::PreAggregated => "pre-aggregated",
            PriceSource::RawOrders => "raw-orders",
            PriceSource::PersistentStore => "persistent-store",
        }
    }
}
