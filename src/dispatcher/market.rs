//! `market(action, …)` tool actions (spec.md §4.7): price/spread/order-book
//! queries and valuation, item identity resolved through the shared
//! [`NameResolver`] before ever touching the market cache.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::market::{MarketCache, ValuationLine};
use crate::cancellation::Deadline;
use crate::error::{ToolError, ToolResult};
use crate::resolver::NameResolver;
use crate::types::Side;
use crate::universe::UniverseGraph;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MarketAction {
    Prices {
        region: String,
        items: Vec<String>,
    },
    Orders {
        region_id: u32,
        item: String,
    },
    Valuation {
        region_id: u32,
        side: String,
        lines: String,
    },
    Spread {
        region_id: u32,
        item: String,
    },
    History {
        region_id: u32,
        item: String,
    },
    FindNearby {
        item: String,
        side: String,
        candidate_regions: Vec<u32>,
        #[serde(default = "default_limit")]
        limit: u32,
    },
}

fn default_limit() -> u32 {
    10
}

fn parse_side(raw: &str) -> ToolResult<Side> {
    Side::parse(raw).ok_or_else(|| ToolError::invalid_parameter("side", "must be buy or sell"))
}

fn resolve_region(graph: &UniverseGraph, region: &str) -> ToolResult<u32> {
    graph
        .region_id_by_name(region)
        .ok_or_else(|| ToolError::invalid_parameter("region", format!("unknown region `{region}`")))
}

pub async fn dispatch(
    graph: &UniverseGraph,
    market: &MarketCache,
    resolver: &Arc<NameResolver>,
    action: MarketAction,
    deadline: Deadline,
) -> ToolResult<Value> {
    match action {
        MarketAction::Prices { region, items } => {
            let region_id = resolve_region(graph, &region)?;
            let mut entries = Vec::with_capacity(items.len());
            for item in &items {
                deadline.check("upstream: item resolution")?;
                let item_type = resolver.resolve(item).await?;
                deadline.check("cache: market")?;
                let result = market.spread(region_id, item_type.id).await;
                let source = result
                    .sell
                    .source
                    .or(result.buy.source)
                    .map(|s| s.as_str());
                let mut warnings = result.buy.warnings.clone();
                warnings.extend(result.sell.warnings.clone());
                entries.push(serde_json::json!({
                    "item": item_type.name,
                    "buy": result.buy.aggregate,
                    "sell": result.sell.aggregate,
                    "source": source,
                    "freshness": result.sell.freshness,
                    "spread_isk": result.spread,
                    "spread_pct": result.spread_pct,
                    "warnings": warnings,
                }));
            }
            Ok(serde_json::json!({
                "region": region,
                "region_id": region_id,
                "total_found": entries.len(),
                "prices": entries,
            }))
        }

        MarketAction::Orders { region_id, item } => {
            deadline.check("upstream: item resolution")?;
            let item_type = resolver.resolve(&item).await?;
            deadline.check("cache: market")?;
            let result = market.orders(region_id, item_type.id).await;
            Ok(serde_json::json!({
                "item": item_type.name,
                "region_id": region_id,
                "total_found": result.orders.len(),
                "orders": result.orders,
                "freshness": result.freshness,
                "warnings": result.warnings,
            }))
        }

        MarketAction::Valuation { region_id, side, lines } => {
            let side = parse_side(&side)?;
            let parsed = crate::cache::market::parse_valuation_lines(&lines);
            if parsed.is_empty() {
                return Err(ToolError::invalid_parameter("lines", "no parsable item lines found"));
            }
            // Resolve through the batched pipeline (chunked at the upstream
            // batch ceiling) rather than one `resolve()` call per line.
            let names: Vec<String> = parsed.iter().map(|(name, _)| name.clone()).collect();
            deadline.check("upstream: item resolution")?;
            let (resolved_items, _errors) = resolver.resolve_many(&names).await;
            let by_lower: std::collections::HashMap<String, crate::types::ItemType> =
                resolved_items.into_iter().map(|it| (it.name_lower.clone(), it)).collect();

            let mut resolved = Vec::with_capacity(parsed.len());
            let mut unresolved = Vec::new();
            for (name, quantity) in &parsed {
                let key = name.trim().to_lowercase();
                match by_lower.get(&key) {
                    Some(item_type) => resolved.push(ValuationLine {
                        item_id: item_type.id,
                        name: item_type.name.clone(),
                        quantity: *quantity,
                    }),
                    None => unresolved.push(name.clone()),
                }
            }
            deadline.check("cache: market")?;
            let mut result = market.valuation(region_id, side, &resolved).await;
            for name in unresolved {
                result.warnings.push(format!("unresolved item: {name}"));
            }
            Ok(serde_json::to_value(result).map_err(|e| ToolError::internal(e.to_string()))?)
        }

        MarketAction::Spread { region_id, item } => {
            deadline.check("upstream: item resolution")?;
            let item_type = resolver.resolve(&item).await?;
            deadline.check("cache: market")?;
            let result = market.spread(region_id, item_type.id).await;
            Ok(serde_json::json!({
                "item": item_type.name,
                "region_id": region_id,
                "buy": result.buy,
                "sell": result.sell,
                "spread": result.spread,
                "spread_pct": result.spread_pct,
            }))
        }

        MarketAction::History { region_id, item } => {
            deadline.check("upstream: item resolution")?;
            let item_type = resolver.resolve(&item).await?;
            deadline.check("cache: market")?;
            let result = market.history(region_id, item_type.id).await;
            Ok(serde_json::json!({
                "item": item_type.name,
                "region_id": region_id,
                "total_found": result.points.len(),
                "points": result.points,
                "freshness": result.freshness,
                "warnings": result.warnings,
            }))
        }

        MarketAction::FindNearby { item, side, candidate_regions, limit } => {
            if !(1..=100).contains(&limit) {
                return Err(ToolError::invalid_parameter("limit", "must be in 1..=100"));
            }
            if candidate_regions.is_empty() {
                return Err(ToolError::invalid_parameter("candidate_regions", "must not be empty"));
            }
            let side = parse_side(&side)?;
            deadline.check("upstream: item resolution")?;
            let item_type = resolver.resolve(&item).await?;
            deadline.check("cache: market")?;
            let hits = market
                .find_nearby(item_type.id, side, &candidate_regions, limit as usize)
                .await;
            Ok(serde_json::json!({
                "item": item_type.name,
                "side": side.as_str(),
                "total_found": hits.len(),
                "hits": hits,
            }))
        }
    }
}
