//! Tool dispatcher (spec.md §4.7 / §6): the single point every surface —
//! HTTP route and CLI subcommand alike — goes through to reach the
//! universe graph, market/volatile caches, persistent store, resolver,
//! sde, skills and fitting services. Each tool's `action` field picks a
//! `#[serde(tag = "action")]` variant; an unrecognized action or an
//! out-of-range parameter comes back as `ErrorKind::InvalidParameter`
//! rather than panicking or falling through to a default.

pub mod market;
pub mod universe;

use std::sync::Arc;

use serde_json::Value;

use crate::cache::market::MarketCache;
use crate::cache::volatile::VolatileCache;
use crate::cancellation::Deadline;
use crate::error::{ToolError, ToolResult};
use crate::fitting::FittingFacade;
use crate::resolver::NameResolver;
use crate::sde::SdeService;
use crate::skills::SkillsService;
use crate::store::PersistentStore;
use crate::universe::UniverseGraph;
use crate::upstream::UpstreamClient;

pub struct Dispatcher {
    pub graph: Arc<UniverseGraph>,
    pub volatile: VolatileCache,
    pub market: MarketCache,
    pub store: PersistentStore,
    pub resolver: Arc<NameResolver>,
    pub client: Arc<UpstreamClient>,
    pub sde: SdeService,
    pub skills: SkillsService,
    pub fitting: FittingFacade,
    started_at: std::time::Instant,
}

impl Dispatcher {
    pub fn new(
        graph: Arc<UniverseGraph>,
        store: PersistentStore,
        client: Arc<UpstreamClient>,
        resolver: Arc<NameResolver>,
    ) -> Self {
        let volatile = VolatileCache::new(client.clone());
        let market = MarketCache::new(client.clone(), store.clone());
        let sde = SdeService::new(graph.clone(), store.clone(), resolver.clone());
        let skills = SkillsService::new();
        let fitting = FittingFacade::new(resolver.clone());
        Self {
            graph,
            volatile,
            market,
            store,
            resolver,
            client,
            sde,
            skills,
            fitting,
            started_at: std::time::Instant::now(),
        }
    }

    pub async fn universe(&self, body: Value) -> ToolResult<Value> {
        let deadline = deadline_from_body(&body);
        let action = serde_json::from_value(body).map_err(|e| {
            ToolError::invalid_parameter(
                "action",
                format!(
                    "must be one of route, systems, borders, search, loop, analyze, nearest, \
                     activity, hotspots, gatecamp_risk, fw_frontlines, local_area ({e})"
                ),
            )
        })?;
        universe::dispatch(&self.graph, &self.volatile, action, deadline).await
    }

    pub async fn market(&self, body: Value) -> ToolResult<Value> {
        let deadline = deadline_from_body(&body);
        let action = serde_json::from_value(body).map_err(|e| {
            ToolError::invalid_parameter(
                "action",
                format!("must be one of prices, orders, valuation, spread, history, find_nearby ({e})"),
            )
        })?;
        market::dispatch(&self.graph, &self.market, &self.resolver, action, deadline).await
    }

    pub async fn sde(&self, body: Value) -> ToolResult<Value> {
        let action = body
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_parameter("action", "must be one of system_info, item_info, search_items"))?;
        match action {
            "system_info" => {
                let name = required_str(&body, "name")?;
                Ok(serde_json::to_value(self.sde.system_info(name)?).map_err(|e| ToolError::internal(e.to_string()))?)
            }
            "item_info" => {
                let name = required_str(&body, "name")?;
                Ok(serde_json::to_value(self.sde.item_info(name).await?).map_err(|e| ToolError::internal(e.to_string()))?)
            }
            "search_items" => {
                let query = required_str(&body, "query")?;
                let limit = body.get("limit").and_then(Value::as_u64).unwrap_or(10) as u32;
                Ok(serde_json::to_value(self.sde.search_items(query, limit).await?)
                    .map_err(|e| ToolError::internal(e.to_string()))?)
            }
            other => Err(ToolError::invalid_parameter(
                "action",
                format!("unrecognized sde action '{other}', expected system_info, item_info or search_items"),
            )),
        }
    }

    pub async fn skills(&self, body: Value) -> ToolResult<Value> {
        let action = body
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_parameter("action", "must be one of training_time, plan"))?;
        match action {
            "training_time" => {
                let skill_name = required_str(&body, "skill_name")?;
                let rank = body
                    .get("rank")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| ToolError::invalid_parameter("rank", "must be a positive integer"))? as u32;
                let from_level = body.get("from_level").and_then(Value::as_u64).unwrap_or(0) as u8;
                let to_level = body
                    .get("to_level")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| ToolError::invalid_parameter("to_level", "required"))? as u8;
                let sp_per_minute = body.get("sp_per_minute").and_then(Value::as_f64);
                let result = self.skills.training_time(skill_name, rank, from_level, to_level, sp_per_minute)?;
                Ok(serde_json::to_value(result).map_err(|e| ToolError::internal(e.to_string()))?)
            }
            "plan" => {
                let entries_raw = body
                    .get("entries")
                    .and_then(Value::as_array)
                    .ok_or_else(|| ToolError::invalid_parameter("entries", "must be an array"))?;
                let mut entries = Vec::with_capacity(entries_raw.len());
                for entry in entries_raw {
                    let skill_name = entry
                        .get("skill_name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| ToolError::invalid_parameter("entries[].skill_name", "required"))?
                        .to_string();
                    let rank = entry
                        .get("rank")
                        .and_then(Value::as_u64)
                        .ok_or_else(|| ToolError::invalid_parameter("entries[].rank", "required"))? as u32;
                    let to_level = entry
                        .get("to_level")
                        .and_then(Value::as_u64)
                        .ok_or_else(|| ToolError::invalid_parameter("entries[].to_level", "required"))? as u8;
                    entries.push((skill_name, rank, to_level));
                }
                let sp_per_minute = body.get("sp_per_minute").and_then(Value::as_f64);
                let result = self.skills.plan(&entries, sp_per_minute)?;
                Ok(serde_json::to_value(result).map_err(|e| ToolError::internal(e.to_string()))?)
            }
            other => Err(ToolError::invalid_parameter(
                "action",
                format!("unrecognized skills action '{other}', expected training_time or plan"),
            )),
        }
    }

    pub async fn fitting(&self, body: Value) -> ToolResult<Value> {
        let action = body
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_parameter("action", "must be calculate_stats"))?;
        if action != "calculate_stats" {
            return Err(ToolError::invalid_parameter(
                "action",
                format!("unrecognized fitting action '{action}', expected calculate_stats"),
            ));
        }
        let fit_text = required_str(&body, "fit_text")?;
        let skill_level = body.get("skill_level").and_then(Value::as_u64).map(|v| v as u8);
        let result = self.fitting.calculate_stats(fit_text, skill_level).await?;
        Ok(serde_json::to_value(result).map_err(|e| ToolError::internal(e.to_string()))?)
    }

    /// `status()`: no input, reports graph size and volatile-cache
    /// freshness so a caller can tell a cold start from a degraded one
    /// without issuing a real query (spec.md §4.7 `status`).
    pub async fn status(&self) -> Value {
        let volatile_status = self.volatile.status();
        serde_json::json!({
            "universe_systems": self.graph.len(),
            "uptime_seconds": self.started_at.elapsed().as_secs(),
            "volatile": volatile_status,
        })
    }
}

/// Every tool action accepts an optional top-level `deadline_ms` (spec.md §5
/// "every dispatcher call accepts a deadline"), milliseconds from now past
/// which the call aborts at its next suspension point with `Cancelled`.
fn deadline_from_body(body: &Value) -> Deadline {
    Deadline::from_millis_from_now(body.get("deadline_ms").and_then(Value::as_u64))
}

fn required_str<'a>(body: &'a Value, field: &'static str) -> ToolResult<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_parameter(field, "required string field"))
}
