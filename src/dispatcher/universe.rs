//! `universe(action, …)` tool actions (spec.md §4.7): routing, system
//! lookup, border/region search, loop planning, and volatile-cache-backed
//! activity/faction-warfare views, all validated per spec.md §4.7's
//! documented parameter ranges before touching the graph or caches.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::volatile::VolatileCache;
use crate::cancellation::Deadline;
use crate::error::{ToolError, ToolResult};
use crate::universe::graph::RouteMode;
use crate::universe::search::SearchFilter;
use crate::universe::{border, enrichment, loop_planner, routing, search, UniverseGraph};

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UniverseAction {
    Route {
        origin: String,
        destination: String,
        #[serde(default = "default_mode")]
        mode: String,
    },
    Systems {
        names: Vec<String>,
    },
    Borders {
        origin: String,
        #[serde(default = "default_limit")]
        limit: u32,
        #[serde(default = "default_max_jumps")]
        max_jumps: u32,
    },
    Search {
        origin: Option<String>,
        max_jumps: Option<u32>,
        security_min: Option<f32>,
        security_max: Option<f32>,
        region: Option<String>,
        #[serde(default)]
        border_only: bool,
        #[serde(default = "default_limit")]
        limit: u32,
    },
    Loop {
        origin: String,
        #[serde(default = "default_target_jumps")]
        target_jumps: u32,
        #[serde(default = "default_min_borders")]
        min_borders: u32,
        #[serde(default = "default_max_borders")]
        max_borders: u32,
    },
    Analyze {
        system: String,
    },
    Nearest {
        origin: String,
        security_class: String,
        #[serde(default = "default_max_jumps")]
        max_jumps: u32,
    },
    Activity {
        systems: Vec<String>,
    },
    Hotspots {
        systems: Vec<String>,
        #[serde(default = "default_limit")]
        limit: u32,
    },
    GatecampRisk {
        systems: Vec<String>,
    },
    FwFrontlines {
        systems: Vec<String>,
    },
    LocalArea {
        origin: String,
        #[serde(default = "default_max_jumps")]
        max_jumps: u32,
    },
}

fn default_mode() -> String {
    "shortest".to_string()
}
fn default_limit() -> u32 {
    10
}
fn default_max_jumps() -> u32 {
    5
}
fn default_target_jumps() -> u32 {
    25
}
fn default_min_borders() -> u32 {
    5
}
fn default_max_borders() -> u32 {
    10
}

fn validate_limit(limit: u32) -> ToolResult<()> {
    if !(1..=100).contains(&limit) {
        return Err(ToolError::invalid_parameter("limit", "must be in 1..=100"));
    }
    Ok(())
}

fn validate_max_jumps(max_jumps: u32) -> ToolResult<()> {
    if !(1..=50).contains(&max_jumps) {
        return Err(ToolError::invalid_parameter("max_jumps", "must be in 1..=50"));
    }
    Ok(())
}

fn resolve_system(graph: &UniverseGraph, name: &str) -> ToolResult<usize> {
    graph
        .index_of_name(name)
        .ok_or_else(|| ToolError::system_not_found(name, graph.suggest_names(name, 3)))
}

pub async fn dispatch(
    graph: &UniverseGraph,
    volatile: &VolatileCache,
    action: UniverseAction,
    deadline: Deadline,
) -> ToolResult<Value> {
    match action {
        UniverseAction::Route { origin, destination, mode } => {
            let mode = RouteMode::parse(&mode)
                .ok_or_else(|| ToolError::invalid_parameter("mode", "must be one of shortest, safe, unsafe"))?;
            let o = resolve_system(graph, &origin)?;
            let d = resolve_system(graph, &destination)?;
            let result = routing::route(graph, mode, o, d, deadline)?
                .ok_or_else(|| ToolError::route_not_found(&origin, &destination))?;
            let enriched = enrichment::enrich(graph, &result.path, mode == RouteMode::Safe);
            Ok(serde_json::json!({
                "origin": origin,
                "destination": destination,
                "mode": mode.as_str(),
                "jumps": result.jumps,
                "systems": enriched.systems,
                "security_summary": enriched.security_summary,
                "chokepoints": enriched.chokepoints,
                "danger_zones": enriched.danger_zones,
                "warnings": enriched.warnings,
            }))
        }

        UniverseAction::Systems { names } => {
            let mut out = Vec::with_capacity(names.len());
            let mut warnings = Vec::new();
            for name in &names {
                match resolve_system(graph, name) {
                    Ok(idx) => out.push(enrichment_system_info(graph, idx)),
                    Err(e) => warnings.push(format!("{}: {}", name, e.message)),
                }
            }
            Ok(serde_json::json!({
                "total_found": out.len(),
                "systems": out,
                "warnings": warnings,
            }))
        }

        UniverseAction::Borders { origin, limit, max_jumps } => {
            validate_limit(limit)?;
            validate_max_jumps(max_jumps)?;
            let o = resolve_system(graph, &origin)?;
            let hits = border::find_borders(graph, o, max_jumps as usize, limit as usize, deadline)?;
            Ok(serde_json::json!({
                "total_found": hits.len(),
                "borders": hits,
            }))
        }

        UniverseAction::Search { origin, max_jumps, security_min, security_max, region, border_only, limit } => {
            validate_limit(limit)?;
            if let Some(mj) = max_jumps {
                validate_max_jumps(mj)?;
            }
            let origin_idx = match &origin {
                Some(name) => Some(resolve_system(graph, name)?),
                None => None,
            };
            let filter = SearchFilter {
                security_min,
                security_max,
                region,
                border_only,
                origin: origin_idx,
                max_jumps,
                limit: limit as usize,
            };
            let hits = search::search(graph, &filter, deadline)?;
            Ok(serde_json::json!({
                "total_found": hits.len(),
                "systems": hits,
            }))
        }

        UniverseAction::Loop { origin, target_jumps, min_borders, max_borders } => {
            if !(10..=100).contains(&target_jumps) {
                return Err(ToolError::invalid_parameter("target_jumps", "must be in 10..=100"));
            }
            if !(2..=10).contains(&min_borders) {
                return Err(ToolError::invalid_parameter("min_borders", "must be in 2..=10"));
            }
            if !(min_borders..=15).contains(&max_borders) {
                return Err(ToolError::invalid_parameter("max_borders", "must be in min_borders..=15"));
            }
            let o = resolve_system(graph, &origin)?;
            let result = loop_planner::plan_loop(graph, o, target_jumps, min_borders as usize, max_borders as usize, deadline)?;
            Ok(serde_json::to_value(result).map_err(|e| ToolError::internal(e.to_string()))?)
        }

        UniverseAction::Analyze { system } => {
            let idx = resolve_system(graph, &system)?;
            Ok(enrichment_system_info(graph, idx))
        }

        UniverseAction::Nearest { origin, security_class, max_jumps } => {
            validate_max_jumps(max_jumps)?;
            let target_class = match security_class.to_lowercase().as_str() {
                "high" => crate::universe::system::SecurityClass::High,
                "low" => crate::universe::system::SecurityClass::Low,
                "null" => crate::universe::system::SecurityClass::Null,
                _ => {
                    return Err(ToolError::invalid_parameter(
                        "security_class",
                        "must be one of high, low, null",
                    ))
                }
            };
            let o = resolve_system(graph, &origin)?;
            let reached = routing::bfs_within(graph, o, max_jumps as usize, deadline)?;
            let hit = reached
                .into_iter()
                .filter(|&(idx, _)| graph.security_class(idx) == target_class)
                .min_by_key(|&(_, dist)| dist);
            match hit {
                Some((idx, dist)) => Ok(serde_json::json!({
                    "name": graph.name[idx],
                    "jumps_from_origin": dist,
                    "security": graph.security[idx],
                })),
                None => Err(ToolError::route_not_found(&origin, &format!("nearest {security_class}"))),
            }
        }

        UniverseAction::Activity { systems } => {
            let ids = resolve_ids(graph, &systems)?;
            deadline.check("cache: volatile")?;
            let result = volatile.activity(&ids).await;
            let records: Vec<Value> = systems
                .iter()
                .zip(ids.iter())
                .map(|(name, id)| {
                    let rec = result.records.get(id).cloned().unwrap_or_default();
                    serde_json::json!({
                        "system": name,
                        "ship_kills": rec.ship_kills,
                        "pod_kills": rec.pod_kills,
                        "npc_kills": rec.npc_kills,
                        "ship_jumps": rec.ship_jumps,
                        "activity_level": rec.activity_level(),
                    })
                })
                .collect();
            Ok(serde_json::json!({
                "total_found": records.len(),
                "systems": records,
                "cache_age_seconds": result.cache_age_seconds,
                "freshness": result.freshness,
                "warnings": result.warnings,
            }))
        }

        UniverseAction::Hotspots { systems, limit } => {
            validate_limit(limit)?;
            let ids = resolve_ids(graph, &systems)?;
            deadline.check("cache: volatile")?;
            let result = volatile.activity(&ids).await;
            let mut ranked: Vec<(String, u32, f64)> = systems
                .iter()
                .zip(ids.iter())
                .map(|(name, id)| {
                    let rec = result.records.get(id).cloned().unwrap_or_default();
                    let score = rec.ship_kills as f64 * 3.0 + rec.pod_kills as f64 * 2.0 + rec.npc_kills as f64;
                    (name.clone(), rec.ship_kills, score)
                })
                .collect();
            ranked.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap());
            ranked.truncate(limit as usize);
            Ok(serde_json::json!({
                "total_found": ranked.len(),
                "hotspots": ranked.into_iter().map(|(name, kills, score)| serde_json::json!({
                    "system": name, "ship_kills": kills, "score": score,
                })).collect::<Vec<_>>(),
                "cache_age_seconds": result.cache_age_seconds,
                "freshness": result.freshness,
            }))
        }

        UniverseAction::GatecampRisk { systems } => {
            let mut out = Vec::with_capacity(systems.len());
            for name in &systems {
                let idx = resolve_system(graph, name)?;
                let is_pipe = graph.security_class(idx) != crate::universe::system::SecurityClass::High
                    && graph.neighbors(idx).len() == 2;
                let risk = if is_pipe {
                    "elevated"
                } else if graph.security_class(idx) != crate::universe::system::SecurityClass::High {
                    "normal"
                } else {
                    "none"
                };
                out.push(serde_json::json!({
                    "system": name,
                    "is_pipe": is_pipe,
                    "neighbor_count": graph.neighbors(idx).len(),
                    "risk": risk,
                }));
            }
            Ok(serde_json::json!({ "total_found": out.len(), "systems": out }))
        }

        UniverseAction::FwFrontlines { systems } => {
            let ids = resolve_ids(graph, &systems)?;
            deadline.check("cache: volatile")?;
            let result = volatile.faction_warfare(&ids).await;
            let mut out = Vec::new();
            for (name, id) in systems.iter().zip(ids.iter()) {
                if let Some(rec) = result.records.get(id) {
                    out.push(serde_json::json!({
                        "system": name,
                        "owner_faction": rec.owner_faction,
                        "occupying_faction": rec.occupying_faction,
                        "contested": rec.contested,
                        "victory_points": rec.victory_points,
                        "victory_points_threshold": rec.victory_points_threshold,
                    }));
                }
            }
            Ok(serde_json::json!({
                "total_found": out.len(),
                "systems": out,
                "cache_age_seconds": result.cache_age_seconds,
                "freshness": result.freshness,
                "warnings": result.warnings,
            }))
        }

        UniverseAction::LocalArea { origin, max_jumps } => {
            validate_max_jumps(max_jumps)?;
            let o = resolve_system(graph, &origin)?;
            let reached = routing::bfs_within(graph, o, max_jumps as usize, deadline)?;
            let mut by_class = (0usize, 0usize, 0usize);
            for &(idx, _) in &reached {
                match graph.security_class(idx) {
                    crate::universe::system::SecurityClass::High => by_class.0 += 1,
                    crate::universe::system::SecurityClass::Low => by_class.1 += 1,
                    crate::universe::system::SecurityClass::Null => by_class.2 += 1,
                }
            }
            Ok(serde_json::json!({
                "origin": origin,
                "max_jumps": max_jumps,
                "total_found": reached.len(),
                "high": by_class.0,
                "low": by_class.1,
                "null": by_class.2,
            }))
        }
    }
}

fn resolve_ids(graph: &UniverseGraph, names: &[String]) -> ToolResult<Vec<u32>> {
    names
        .iter()
        .map(|n| resolve_system(graph, n).map(|idx| graph.system_id[idx]))
        .collect()
}

fn enrichment_system_info(graph: &UniverseGraph, idx: usize) -> Value {
    serde_json::json!({
        "name": graph.name[idx],
        "id": graph.system_id[idx],
        "security": graph.security[idx],
        "security_class": graph.security_class(idx).as_str(),
        "is_border": graph.is_border(idx),
        "neighbor_count": graph.neighbors(idx).len(),
    })
}
