//! Multi-tier market cache (spec.md §4.5): pre-aggregated prices, raw order
//! books, and daily history, each partitioned per region since every region
//! refreshes independently, backstopped by the persistent store and finally
//! by whatever stale in-memory value is left over from a prior refresh.
//!
//! Fallback chain for a single (region, item, side) price lookup:
//!   1. pre-aggregated upstream aggregate for the region (source A)
//!   2. raw order book for the region, aggregated on the fly (source B)
//!   3. persistent store's last seeded/synced value (source C)
//!   4. whichever of A/B still has a stale in-memory value, marked as such
//! Each attempt is independent: a transient failure of one tier does not
//! short-circuit the next (spec.md §4.5 Fallback chain).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock as SyncRwLock;
use serde::Serialize;

use crate::config::DEFAULT_UPSTREAM_TIMEOUT;
use crate::store::PersistentStore;
use crate::types::{Freshness, HistoryPoint, MarketOrder, PriceAggregate, PriceSource, Side};
use crate::upstream::endpoints;
use crate::upstream::UpstreamClient;

use super::layer::CacheLayer;

const PRE_AGG_TTL: Duration = Duration::from_secs(15 * 60);
const RAW_ORDERS_TTL: Duration = Duration::from_secs(5 * 60);
const HISTORY_TTL: Duration = Duration::from_secs(60 * 60);

/// A single-valued `CacheLayer` partitioned by an arbitrary key (region id,
/// or (region, item) for history), created lazily on first access so one
/// partition's refresh lock never blocks another's.
struct Partitioned<K, V> {
    ttl: Duration,
    layers: SyncRwLock<HashMap<K, Arc<CacheLayer<(), V>>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Partitioned<K, V> {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            layers: SyncRwLock::new(HashMap::new()),
        }
    }

    fn layer(&self, key: &K) -> Arc<CacheLayer<(), V>> {
        if let Some(l) = self.layers.read().get(key) {
            return l.clone();
        }
        let mut w = self.layers.write();
        w.entry(key.clone())
            .or_insert_with(|| Arc::new(CacheLayer::new(self.ttl)))
            .clone()
    }
}

fn pre_agg_freshness(age: Option<Duration>) -> Freshness {
    match age {
        None => Freshness::Stale,
        Some(a) if a < Duration::from_secs(5 * 60) => Freshness::Fresh,
        Some(a) if a < Duration::from_secs(15 * 60) => Freshness::Recent,
        Some(_) => Freshness::Stale,
    }
}

fn raw_order_freshness(age: Option<Duration>) -> Freshness {
    match age {
        None => Freshness::Stale,
        Some(a) if a < Duration::from_secs(2 * 60) => Freshness::Fresh,
        Some(a) if a < Duration::from_secs(5 * 60) => Freshness::Recent,
        Some(_) => Freshness::Stale,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceResult {
    pub aggregate: Option<PriceAggregate>,
    pub source: Option<PriceSource>,
    pub freshness: Freshness,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadResult {
    pub buy: PriceResult,
    pub sell: PriceResult,
    pub spread: Option<f64>,
    pub spread_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrdersResult {
    pub orders: Vec<MarketOrder>,
    pub freshness: Freshness,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResult {
    pub points: Vec<HistoryPoint>,
    pub freshness: Freshness,
    pub warnings: Vec<String>,
}

/// One resolved or unresolved line of a free-text valuation request
/// (spec.md §4.7 `valuation` action).
#[derive(Debug, Clone, Serialize)]
pub struct ValuationLine {
    pub item_id: u32,
    pub name: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValuationLineResult {
    pub item_id: u32,
    pub name: String,
    pub quantity: u64,
    pub unit_price: Option<f64>,
    pub subtotal: f64,
    pub freshness: Option<Freshness>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValuationResult {
    pub total: f64,
    pub confidence: &'static str,
    pub lines: Vec<ValuationLineResult>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyHit {
    pub region_id: u32,
    pub price: PriceAggregate,
    pub source: PriceSource,
    pub freshness: Freshness,
}

pub struct MarketCache {
    client: Arc<UpstreamClient>,
    store: PersistentStore,
    pre_agg: Partitioned<u32, HashMap<(u32, Side), PriceAggregate>>,
    raw_orders: Partitioned<u32, Vec<MarketOrder>>,
    history: Partitioned<(u32, u32), Vec<HistoryPoint>>,
}

impl MarketCache {
    pub fn new(client: Arc<UpstreamClient>, store: PersistentStore) -> Self {
        Self {
            client,
            store,
            pre_agg: Partitioned::new(PRE_AGG_TTL),
            raw_orders: Partitioned::new(RAW_ORDERS_TTL),
            history: Partitioned::new(HISTORY_TTL),
        }
    }

    async fn pre_agg_read(&self, region_id: u32) -> super::layer::LayerRead<(), HashMap<(u32, Side), PriceAggregate>> {
        let layer = self.pre_agg.layer(&region_id);
        let client = self.client.clone();
        layer
            .get_or_refresh(|| async move {
                let flat = endpoints::fetch_region_aggregates(&client, region_id, DEFAULT_UPSTREAM_TIMEOUT).await?;
                Ok(HashMap::from([((), flat)]))
            })
            .await
    }

    async fn raw_orders_read(&self, region_id: u32) -> super::layer::LayerRead<(), Vec<MarketOrder>> {
        let layer = self.raw_orders.layer(&region_id);
        let client = self.client.clone();
        layer
            .get_or_refresh(|| async move {
                let orders = endpoints::fetch_region_orders(&client, region_id, DEFAULT_UPSTREAM_TIMEOUT).await?;
                Ok(HashMap::from([((), orders)]))
            })
            .await
    }

    /// Walk the fallback chain for one (region, item, side) price
    /// (spec.md §4.5 Fallback chain).
    pub async fn price(&self, region_id: u32, item_id: u32, side: Side) -> PriceResult {
        let mut warnings = Vec::new();

        let pre_agg = self.pre_agg_read(region_id).await;
        warnings.extend(pre_agg.warning.clone());
        if !pre_agg.stale {
            if let Some(agg) = pre_agg.data.get(&()).and_then(|m| m.get(&(item_id, side))) {
                return PriceResult {
                    aggregate: Some(agg.clone()),
                    source: Some(PriceSource::PreAggregated),
                    freshness: pre_agg_freshness(pre_agg.age),
                    warnings,
                };
            }
        }

        let raw = self.raw_orders_read(region_id).await;
        warnings.extend(raw.warning.clone());
        if !raw.stale {
            if let Some(orders) = raw.data.get(&()) {
                let item_orders: Vec<MarketOrder> = orders.iter().filter(|o| o.item_id == item_id).cloned().collect();
                let agg_by_side = endpoints::aggregate_orders(region_id, item_id, &item_orders);
                if let Some(agg) = agg_by_side.get(&side) {
                    return PriceResult {
                        aggregate: Some(agg.clone()),
                        source: Some(PriceSource::RawOrders),
                        freshness: raw_order_freshness(raw.age),
                        warnings,
                    };
                }
            }
        }

        match self.store.get_aggregate(region_id, item_id, side).await {
            Ok(Some(agg)) => {
                return PriceResult {
                    aggregate: Some(agg),
                    source: Some(PriceSource::PersistentStore),
                    freshness: Freshness::Stale,
                    warnings,
                };
            }
            Ok(None) => {}
            Err(e) => warnings.push(format!("persistent store lookup failed: {e}")),
        }

        // Last-known-good: whichever in-memory tier still holds a stale
        // value for this key, even though its refresh attempt above failed.
        if let Some(agg) = pre_agg.data.get(&()).and_then(|m| m.get(&(item_id, side))) {
            warnings.push("serving last-known-good pre-aggregated price, considered stale".into());
            return PriceResult {
                aggregate: Some(agg.clone()),
                source: Some(PriceSource::PreAggregated),
                freshness: Freshness::Stale,
                warnings,
            };
        }
        if let Some(orders) = raw.data.get(&()) {
            let item_orders: Vec<MarketOrder> = orders.iter().filter(|o| o.item_id == item_id).cloned().collect();
            if let Some(agg) = endpoints::aggregate_orders(region_id, item_id, &item_orders).get(&side) {
                warnings.push("serving last-known-good raw-order price, considered stale".into());
                return PriceResult {
                    aggregate: Some(agg.clone()),
                    source: Some(PriceSource::RawOrders),
                    freshness: Freshness::Stale,
                    warnings,
                };
            }
        }

        warnings.push(format!("no price available for item {item_id} in region {region_id}"));
        PriceResult {
            aggregate: None,
            source: None,
            freshness: Freshness::Stale,
            warnings,
        }
    }

    /// `spread_isk = max(0, sell.min − buy.max)` (spec.md:266) — the two
    /// sides' own min/max, not a delta of weighted averages, so a crossed
    /// or co-located book never reports a negative spread.
    pub async fn spread(&self, region_id: u32, item_id: u32) -> SpreadResult {
        let buy = self.price(region_id, item_id, Side::Buy).await;
        let sell = self.price(region_id, item_id, Side::Sell).await;
        let spread = match (&buy.aggregate, &sell.aggregate) {
            (Some(b), Some(s)) => Some((s.min - b.max).max(0.0)),
            _ => None,
        };
        let spread_pct = match (spread, &buy.aggregate) {
            (Some(sp), Some(b)) if b.max > 0.0 => Some(sp / b.max * 100.0),
            _ => None,
        };
        SpreadResult { buy, sell, spread, spread_pct }
    }

    pub async fn orders(&self, region_id: u32, item_id: u32) -> OrdersResult {
        let raw = self.raw_orders_read(region_id).await;
        let orders = raw
            .data
            .get(&())
            .map(|all| all.iter().filter(|o| o.item_id == item_id).cloned().collect())
            .unwrap_or_default();
        OrdersResult {
            orders,
            freshness: raw_order_freshness(raw.age),
            warnings: raw.warning.into_iter().collect(),
        }
    }

    pub async fn history(&self, region_id: u32, item_id: u32) -> HistoryResult {
        let layer = self.history.layer(&(region_id, item_id));
        let client = self.client.clone();
        let read = layer
            .get_or_refresh(|| async move {
                let points = endpoints::fetch_item_history(&client, region_id, item_id, DEFAULT_UPSTREAM_TIMEOUT).await?;
                Ok(HashMap::from([((), points)]))
            })
            .await;
        HistoryResult {
            points: read.data.get(&()).cloned().unwrap_or_default(),
            freshness: super::layer::classify(read.age, HISTORY_TTL),
            warnings: read.warning.into_iter().collect(),
        }
    }

    /// Price a fit/cargo list already resolved to item ids (spec.md §4.7
    /// `valuation` action). Confidence drops to `medium` if any line is
    /// non-fresh, and to `low` if any line has no price at all.
    pub async fn valuation(&self, region_id: u32, side: Side, lines: &[ValuationLine]) -> ValuationResult {
        let mut results = Vec::with_capacity(lines.len());
        let mut warnings = Vec::new();
        let mut total = 0.0;
        let mut any_missing = false;
        let mut any_non_fresh = false;

        for line in lines {
            let priced = self.price(region_id, line.item_id, side).await;
            warnings.extend(priced.warnings);
            match priced.aggregate {
                Some(agg) => {
                    let subtotal = agg.weighted_average * line.quantity as f64;
                    total += subtotal;
                    if priced.freshness != Freshness::Fresh {
                        any_non_fresh = true;
                    }
                    results.push(ValuationLineResult {
                        item_id: line.item_id,
                        name: line.name.clone(),
                        quantity: line.quantity,
                        unit_price: Some(agg.weighted_average),
                        subtotal,
                        freshness: Some(priced.freshness),
                    });
                }
                None => {
                    any_missing = true;
                    warnings.push(format!("{} ({}) has no priced entry and was excluded from the total", line.name, line.item_id));
                    results.push(ValuationLineResult {
                        item_id: line.item_id,
                        name: line.name.clone(),
                        quantity: line.quantity,
                        unit_price: None,
                        subtotal: 0.0,
                        freshness: None,
                    });
                }
            }
        }

        let confidence = if any_missing {
            "low"
        } else if any_non_fresh {
            "medium"
        } else {
            "high"
        };

        ValuationResult { total, confidence, lines: results, warnings }
    }

    /// Cheapest (buy) or richest (sell) price for one item across a caller
    /// supplied candidate set of regions (spec.md §4.7 `find_nearby`).
    pub async fn find_nearby(&self, item_id: u32, side: Side, candidate_regions: &[u32], limit: usize) -> Vec<NearbyHit> {
        let mut hits = Vec::new();
        for &region_id in candidate_regions {
            let priced = self.price(region_id, item_id, side).await;
            if let (Some(agg), Some(source)) = (priced.aggregate, priced.source) {
                hits.push(NearbyHit { region_id, price: agg, source, freshness: priced.freshness });
            }
        }
        match side {
            Side::Sell => hits.sort_by(|a, b| a.price.weighted_average.partial_cmp(&b.price.weighted_average).unwrap()),
            Side::Buy => hits.sort_by(|a, b| b.price.weighted_average.partial_cmp(&a.price.weighted_average).unwrap()),
        }
        hits.truncate(limit.max(1));
        hits
    }
}

/// Parse free-text cargo/fit pastes into (name, quantity) pairs, without
/// resolving names to item ids — that's the resolver's job. Handles the
/// three common paste shapes: EVE's tab-separated multibuy export, an
/// inventory-window "Quantity: N" line, and a plain "Name xN" shorthand
/// (spec.md §4.7 `valuation` free-text input).
pub fn parse_valuation_lines(text: &str) -> Vec<(String, u64)> {
    text.lines().filter_map(parse_one_line).collect()
}

fn parse_one_line(line: &str) -> Option<(String, u64)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if line.contains('\t') {
        let mut parts = line.split('\t');
        let name = parts.next().unwrap_or("").trim().to_string();
        let qty = parts
            .next()
            .and_then(|s| s.trim().replace(',', "").parse::<u64>().ok())
            .unwrap_or(1)
            .max(1);
        if !name.is_empty() {
            return Some((name, qty));
        }
    }

    if let Some(idx) = line.to_lowercase().find("quantity:") {
        let name = line[..idx].trim().trim_end_matches(['-', ':']).trim().to_string();
        let digits: String = line[idx + "quantity:".len()..]
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !name.is_empty() {
            return Some((name, digits.parse::<u64>().unwrap_or(1).max(1)));
        }
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if let Some(last) = tokens.last() {
        if let Some(stripped) = last.strip_prefix(['x', 'X']) {
            if let Ok(qty) = stripped.parse::<u64>() {
                let name = tokens[..tokens.len() - 1].join(" ");
                if !name.is_empty() {
                    return Some((name, qty.max(1)));
                }
            }
        }
    }
    if let Some(first) = tokens.first() {
        if let Some(stripped) = first.strip_suffix(['x', 'X']) {
            if let Ok(qty) = stripped.parse::<u64>() {
                let name = tokens[1..].join(" ");
                if !name.is_empty() {
                    return Some((name, qty.max(1)));
                }
            }
        }
    }

    Some((line.to_string(), 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tab_separated_multibuy() {
        let out = parse_valuation_lines("Tritanium\t1000\nPyerite\t500\n");
        assert_eq!(out, vec![("Tritanium".to_string(), 1000), ("Pyerite".to_string(), 500)]);
    }

    #[test]
    fn parses_quantity_colon_style() {
        let out = parse_valuation_lines("Tritanium - Quantity: 250");
        assert_eq!(out, vec![("Tritanium".to_string(), 250)]);
    }

    #[test]
    fn parses_multiply_suffix_style() {
        let out = parse_valuation_lines("Scourge Fury Heavy Missile x500");
        assert_eq!(out, vec![("Scourge Fury Heavy Missile".to_string(), 500)]);
    }

    #[test]
    fn bare_name_defaults_to_quantity_one() {
        let out = parse_valuation_lines("Tritanium");
        assert_eq!(out, vec![("Tritanium".to_string(), 1)]);
    }
}
