//! Typed wrappers over the four upstream endpoint families (spec.md §6):
//! galaxy-wide kills, galaxy-wide jumps, faction-warfare systems, and
//! per-region market data.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::config::BULK_UPSTREAM_TIMEOUT;
use crate::error::ToolError;
use crate::types::{
    ActivityRecord, ContestedState, FactionWarfareRecord, HistoryPoint, MarketOrder, PriceAggregate, Side,
};

use super::client::UpstreamClient;

#[derive(Debug, Deserialize)]
struct RawSystemKills {
    system_id: u32,
    ship_kills: u32,
    #[serde(default)]
    pod_kills: u32,
    npc_kills: u32,
}

#[derive(Debug, Deserialize)]
struct RawSystemJumps {
    system_id: u32,
    ship_jumps: u32,
}

#[derive(Debug, Deserialize)]
struct RawFwSystem {
    system_id: u32,
    owner_faction_id: String,
    occupier_faction_id: String,
    contested: String,
    victory_points: u32,
    victory_points_threshold: u32,
}

#[derive(Debug, Deserialize)]
struct RawAggregate {
    #[serde(rename = "type_id")]
    item_id: u32,
    weighted_average: f64,
    max: f64,
    min: f64,
    median: f64,
    #[serde(default)]
    stddev: f64,
    volume: f64,
    order_count: u32,
    #[serde(default)]
    percentile: f64,
}

#[derive(Debug, Deserialize)]
struct RawHistoryPoint {
    date: String,
    average: f64,
    highest: f64,
    lowest: f64,
    volume: u64,
    order_count: u32,
}

#[derive(Debug, Deserialize)]
struct RawTypeSearchHit {
    #[serde(rename = "type_id")]
    id: u32,
    name: String,
    group_id: u32,
    #[serde(default)]
    market_group_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    order_id: u64,
    type_id: u32,
    price: f64,
    volume_remain: u64,
    volume_total: u64,
    location_id: u64,
    is_buy_order: bool,
    range: String,
    duration: u32,
    issued: String,
}

/// Kill counts for one system, as tracked by the `kills` cache layer
/// (spec.md §4.4 — kills and jumps refresh independently).
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct KillCounts {
    pub ship_kills: u32,
    pub pod_kills: u32,
    pub npc_kills: u32,
}

/// Galaxy-wide per-system kills (spec.md §4.4 `kills` layer, §6).
pub async fn fetch_kills(client: &UpstreamClient) -> Result<HashMap<u32, KillCounts>, ToolError> {
    let bytes = client
        .get("/universe/system_kills/", &[], BULK_UPSTREAM_TIMEOUT)
        .await?;
    let raw: Vec<RawSystemKills> = serde_json::from_slice(&bytes)
        .map_err(|e| ToolError::internal(format!("parsing system_kills: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|k| {
            (
                k.system_id,
                KillCounts {
                    ship_kills: k.ship_kills,
                    pod_kills: k.pod_kills,
                    npc_kills: k.npc_kills,
                },
            )
        })
        .collect())
}

/// Galaxy-wide per-system ship jumps (spec.md §4.4 `jumps` layer, §6).
pub async fn fetch_jumps(client: &UpstreamClient) -> Result<HashMap<u32, u32>, ToolError> {
    let bytes = client
        .get("/universe/system_jumps/", &[], BULK_UPSTREAM_TIMEOUT)
        .await?;
    let raw: Vec<RawSystemJumps> = serde_json::from_slice(&bytes)
        .map_err(|e| ToolError::internal(format!("parsing system_jumps: {e}")))?;
    Ok(raw.into_iter().map(|j| (j.system_id, j.ship_jumps)).collect())
}

/// Merge the two independently-refreshed layers into the data-model shape
/// the tool surface reports (spec.md §3 Activity record).
pub fn merge_activity(
    kills: &HashMap<u32, KillCounts>,
    jumps: &HashMap<u32, u32>,
    system_id: u32,
) -> ActivityRecord {
    let k = kills.get(&system_id).copied().unwrap_or_default();
    ActivityRecord {
        ship_kills: k.ship_kills,
        pod_kills: k.pod_kills,
        npc_kills: k.npc_kills,
        ship_jumps: jumps.get(&system_id).copied().unwrap_or_default(),
    }
}

/// Fetch galaxy-wide faction-warfare system status (spec.md §3, §6).
pub async fn fetch_faction_warfare(
    client: &UpstreamClient,
) -> Result<HashMap<u32, FactionWarfareRecord>, ToolError> {
    let bytes = client
        .get("/fw/systems/", &[], BULK_UPSTREAM_TIMEOUT)
        .await?;
    let raw: Vec<RawFwSystem> = serde_json::from_slice(&bytes)
        .map_err(|e| ToolError::internal(format!("parsing fw/systems: {e}")))?;

    let mut map = HashMap::with_capacity(raw.len());
    for r in raw {
        let contested = match r.contested.as_str() {
            "contested" => ContestedState::Contested,
            "vulnerable" => ContestedState::Vulnerable,
            _ => ContestedState::Uncontested,
        };
        map.insert(
            r.system_id,
            FactionWarfareRecord {
                owner_faction: r.owner_faction_id,
                occupying_faction: r.occupier_faction_id,
                contested,
                victory_points: r.victory_points,
                victory_points_threshold: r.victory_points_threshold,
            },
        );
    }
    Ok(map)
}

/// Source A: pre-aggregated prices for one region, both sides, keyed by item
/// id (spec.md §4.5 fallback chain).
pub async fn fetch_region_aggregates(
    client: &UpstreamClient,
    region_id: u32,
    timeout: Duration,
) -> Result<HashMap<(u32, Side), PriceAggregate>, ToolError> {
    let endpoint = format!("/markets/{region_id}/prices/");
    let bytes = client.get(&endpoint, &[], timeout).await?;
    let raw: Vec<(Side, RawAggregate)> = {
        #[derive(Deserialize)]
        struct Envelope {
            buy: Vec<RawAggregate>,
            sell: Vec<RawAggregate>,
        }
        let env: Envelope = serde_json::from_slice(&bytes)
            .map_err(|e| ToolError::internal(format!("parsing region aggregates: {e}")))?;
        env.buy
            .into_iter()
            .map(|a| (Side::Buy, a))
            .chain(env.sell.into_iter().map(|a| (Side::Sell, a)))
            .collect()
    };

    let now = chrono::Utc::now().timestamp();
    let mut map = HashMap::with_capacity(raw.len());
    for (side, a) in raw {
        map.insert(
            (a.item_id, side),
            PriceAggregate {
                region_id,
                item_id: a.item_id,
                side,
                weighted_average: a.weighted_average,
                min: a.min,
                max: a.max,
                median: a.median,
                stddev: a.stddev,
                volume: a.volume,
                order_count: a.order_count,
                percentile: a.percentile,
                last_updated: now,
            },
        );
    }
    Ok(map)
}

/// Source B: raw live orders for one region, paginated (spec.md §4.5).
pub async fn fetch_region_orders(
    client: &UpstreamClient,
    region_id: u32,
    timeout: Duration,
) -> Result<Vec<MarketOrder>, ToolError> {
    let endpoint = format!("/markets/{region_id}/orders/");
    let pages = client.get_paginated(&endpoint, &[], timeout).await?;

    let mut orders = Vec::new();
    for page in pages {
        let raw: Vec<RawOrder> = match serde_json::from_slice(&page) {
            Ok(v) => v,
            // Parse failures on individual pages are skipped rather than
            // failing the whole batch (spec.md §7 propagation rule).
            Err(_) => continue,
        };
        orders.extend(raw.into_iter().map(|o| MarketOrder {
            order_id: o.order_id,
            item_id: o.type_id,
            price: o.price,
            remaining_volume: o.volume_remain,
            total_volume: o.volume_total,
            location_id: o.location_id,
            is_buy_order: o.is_buy_order,
            range: o.range,
            duration: o.duration,
            issued_at: o.issued,
        }));
    }
    Ok(orders)
}

/// Daily history series for one item in one region (spec.md §4.7 `history`
/// action). Backed by its own cache layer, separate from the live-price
/// fallback chain since it's read far less often and tolerates a longer TTL.
pub async fn fetch_item_history(
    client: &UpstreamClient,
    region_id: u32,
    item_id: u32,
    timeout: Duration,
) -> Result<Vec<HistoryPoint>, ToolError> {
    let endpoint = format!("/markets/{region_id}/history/");
    let bytes = client
        .get(&endpoint, &[("type_id", &item_id.to_string())], timeout)
        .await?;
    let raw: Vec<RawHistoryPoint> = serde_json::from_slice(&bytes)
        .map_err(|e| ToolError::internal(format!("parsing market history: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|p| HistoryPoint {
            date: p.date,
            average: p.average,
            highest: p.highest,
            lowest: p.lowest,
            volume: p.volume,
            order_count: p.order_count,
        })
        .collect())
}

/// Stage 3 of the name resolver's pipeline: upstream item-name search
/// (spec.md §4.6). Returns the best (first) match, or `None` on a clean
/// empty result — a genuine upstream failure still propagates as `Err` so
/// the resolver can tell "no such item" apart from "upstream is down".
pub async fn search_item_type(
    client: &UpstreamClient,
    query: &str,
) -> Result<Option<crate::types::ItemType>, ToolError> {
    let bytes = client
        .get(
            "/universe/ids/",
            &[("search", query), ("strict", "false")],
            crate::config::DEFAULT_UPSTREAM_TIMEOUT,
        )
        .await?;
    let raw: Vec<RawTypeSearchHit> = serde_json::from_slice(&bytes)
        .map_err(|e| ToolError::internal(format!("parsing universe/ids search: {e}")))?;
    Ok(raw.into_iter().next().map(|hit| crate::types::ItemType {
        id: hit.id,
        name: hit.name.clone(),
        name_lower: hit.name.to_lowercase(),
        group_id: hit.group_id,
        market_group_id: hit.market_group_id,
    }))
}

/// Batch variant of [`search_item_type`]: one upstream call resolving many
/// names at once, the way `resolve_many`'s residual stage needs (spec.md
/// §4.6 "one upstream batch call for the residual"). Callers are expected to
/// chunk `names` at `rate_limit::MAX_BATCH_ITEMS` themselves — this function
/// issues exactly one request for whatever it's given.
pub async fn search_item_types_batch(
    client: &UpstreamClient,
    names: &[String],
) -> Result<Vec<crate::types::ItemType>, ToolError> {
    let joined = names.join(",");
    let bytes = client
        .get(
            "/universe/ids/",
            &[("names", joined.as_str()), ("strict", "false")],
            crate::config::DEFAULT_UPSTREAM_TIMEOUT,
        )
        .await?;
    let raw: Vec<RawTypeSearchHit> = serde_json::from_slice(&bytes)
        .map_err(|e| ToolError::internal(format!("parsing universe/ids batch search: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|hit| crate::types::ItemType {
            id: hit.id,
            name: hit.name.clone(),
            name_lower: hit.name.to_lowercase(),
            group_id: hit.group_id,
            market_group_id: hit.market_group_id,
        })
        .collect())
}

/// Aggregate raw orders into a `PriceAggregate` per item/side on the fly,
/// the way source B backstops source A when pre-aggregated prices are
/// unavailable (spec.md §4.5).
pub fn aggregate_orders(
    region_id: u32,
    item_id: u32,
    orders: &[MarketOrder],
) -> HashMap<Side, PriceAggregate> {
    let mut by_side: HashMap<Side, Vec<f64>> = HashMap::new();
    for o in orders {
        let side = if o.is_buy_order { Side::Buy } else { Side::Sell };
        by_side.entry(side).or_default().push(o.price);
    }

    let now = chrono::Utc::now().timestamp();
    let mut out = HashMap::new();
    for (side, mut prices) in by_side {
        if prices.is_empty() {
            continue;
        }
        prices.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = prices.len();
        let sum: f64 = prices.iter().sum();
        let mean = sum / n as f64;
        let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (prices[n / 2 - 1] + prices[n / 2]) / 2.0
        } else {
            prices[n / 2]
        };
        out.insert(
            side,
            PriceAggregate {
                region_id,
                item_id,
                side,
                weighted_average: mean,
                min: prices[0],
                max: prices[n - 1],
                median,
                stddev: variance.sqrt(),
                volume: n as f64,
                order_count: n as u32,
                percentile: prices[((n as f64) * 0.05) as usize],
                last_updated: now,
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketOrder;

    fn order(price: f64, is_buy: bool) -> MarketOrder {
        MarketOrder {
            order_id: 1,
            item_id: 42,
            price,
            remaining_volume: 10,
            total_volume: 10,
            location_id: 1,
            is_buy_order: is_buy,
            range: "region".into(),
            duration: 90,
            issued_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn aggregates_orders_by_side() {
        let orders = vec![order(100.0, true), order(110.0, true), order(200.0, false)];
        let agg = aggregate_orders(1, 42, &orders);
        assert_eq!(agg.get(&Side::Buy).unwrap().order_count, 2);
        assert_eq!(agg.get(&Side::Sell).unwrap().order_count, 1);
        assert!((agg.get(&Side::Buy).unwrap().weighted_average - 105.0).abs() < 1e-9);
    }
}
