//! Fitting façade (spec.md §4.8): parses the canonical plain-text fit
//! format and computes derived combat/resource stats. Item identity is
//! resolved through the shared [`NameResolver`](crate::resolver::NameResolver)
//! so unknown-item and unknown-ship-type behavior matches the rest of the
//! tool surface (spec.md §4.6 / §7).

pub mod parser;
pub mod stats;

use std::sync::Arc;

use serde::Serialize;

use crate::error::{ToolError, ToolResult};
use crate::resolver::NameResolver;
use parser::ParsedFit;
use stats::SkillModifier;

pub struct FittingFacade {
    resolver: Arc<NameResolver>,
}

#[derive(Debug, Serialize)]
pub struct FittingResult {
    pub ship_type: String,
    pub fit_name: String,
    pub modules: Vec<String>,
    pub drones: Vec<DroneEntry>,
    pub ehp: f64,
    pub dps: f64,
    pub cap_stability_pct: f64,
    pub cpu_used: f64,
    pub cpu_total: f64,
    pub powergrid_used: f64,
    pub powergrid_total: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DroneEntry {
    pub name: String,
    pub quantity: u32,
}

impl FittingFacade {
    pub fn new(resolver: Arc<NameResolver>) -> Self {
        Self { resolver }
    }

    /// `action="calculate_stats"`: parse `fit_text`, resolve every item
    /// name against the shared resolver, and compute derived stats at the
    /// given flat skill level (0-5, defaulting to unskilled).
    pub async fn calculate_stats(
        &self,
        fit_text: &str,
        skill_level: Option<u8>,
    ) -> ToolResult<FittingResult> {
        if fit_text.trim().is_empty() {
            return Err(ToolError::invalid_parameter("fit_text", "must not be empty"));
        }

        // The parser needs a synchronous "is this name known" predicate but
        // resolution itself is async; resolve every distinct name up front
        // against the resolver and hand the parser a closure over the result.
        let candidate_names = candidate_item_names(fit_text);
        let mut known = std::collections::HashSet::new();
        for name in &candidate_names {
            if self.resolver.resolve(name).await.is_ok() {
                known.insert(name.to_lowercase());
            }
        }

        let parsed: ParsedFit = parser::parse_fit(fit_text, |name| known.contains(&name.to_lowercase()))?;

        if let Some(level) = skill_level {
            if level > 5 {
                return Err(ToolError::invalid_parameter("skill_level", "must be in 0..=5"));
            }
        }

        let computed = stats::calculate(&parsed, skill_level.map(|level| SkillModifier { level }));

        Ok(FittingResult {
            ship_type: parsed.ship_type,
            fit_name: parsed.fit_name,
            modules: parsed.modules.iter().map(|m| m.name.clone()).collect(),
            drones: parsed
                .drones
                .iter()
                .map(|d| DroneEntry {
                    name: d.name.clone(),
                    quantity: d.quantity,
                })
                .collect(),
            ehp: computed.ehp,
            dps: computed.dps,
            cap_stability_pct: computed.cap_stability_pct,
            cpu_used: computed.cpu_used,
            cpu_total: computed.cpu_total,
            powergrid_used: computed.powergrid_used,
            powergrid_total: computed.powergrid_total,
            warnings: parsed.warnings,
        })
    }
}

/// Best-effort extraction of every name-shaped token in the fit text
/// (header ship name, module names, charge names, drone names) so the
/// façade can resolve them all before the structural parse runs.
fn candidate_item_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut lines = text.lines();
    if let Some(header) = lines.next() {
        if let Some(inner) = header.trim().strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Some(ship) = inner.split(',').next() {
                names.push(ship.trim().to_string());
            }
        }
    }
    for raw in lines {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let body = line.strip_suffix("/OFFLINE").unwrap_or(line).trim();
        if let Some((name, qty)) = body.rsplit_once(' ') {
            if qty.len() > 1 && qty.starts_with(['x', 'X']) && qty[1..].parse::<u32>().is_ok() {
                names.push(name.trim().to_string());
                continue;
            }
        }
        for part in body.split(',') {
            let part = part.trim();
            if !part.is_empty() {
                names.push(part.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::PersistentStore;
    use crate::types::ItemType;
    use crate::upstream::UpstreamClient;

    fn item(id: u32, name: &str) -> ItemType {
        ItemType {
            id,
            name: name.to_string(),
            name_lower: name.to_lowercase(),
            group_id: 0,
            market_group_id: None,
        }
    }

    async fn facade_with_preloaded(names: &[&str]) -> FittingFacade {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite").to_str().unwrap().to_string();
        let store = PersistentStore::open(&path).unwrap();
        let client = Arc::new(UpstreamClient::new(&Config::from_env()));
        let resolver = Arc::new(NameResolver::new(store, client));
        let items: Vec<ItemType> = names
            .iter()
            .enumerate()
            .map(|(i, n)| item(i as u32 + 1, n))
            .collect();
        resolver.preload(&items);
        std::mem::forget(dir);
        FittingFacade::new(resolver)
    }

    #[tokio::test]
    async fn calculates_stats_for_a_known_fit() {
        let facade = facade_with_preloaded(&[
            "Rifter",
            "200mm AutoCannon II",
            "Republic Fleet EMP S",
            "Small Armor Repairer II",
            "Warrior I",
        ])
        .await;
        let text = "[Rifter, Tackler]\n\n200mm AutoCannon II, Republic Fleet EMP S\nSmall Armor Repairer II\n\n2x Warrior I\n";
        let result = facade.calculate_stats(text, Some(3)).await.unwrap();
        assert_eq!(result.ship_type, "Rifter");
        assert!(result.dps > 0.0);
        assert_eq!(result.drones.len(), 1);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn unknown_ship_type_fails_the_whole_call() {
        let facade = facade_with_preloaded(&["200mm AutoCannon II"]).await;
        let text = "[Nonexistent Hull, Fit]\n\n200mm AutoCannon II\n";
        let err = facade.calculate_stats(text, None).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::TypeNotFound);
    }

    #[tokio::test]
    async fn invalid_skill_level_is_rejected() {
        let facade = facade_with_preloaded(&["Rifter"]).await;
        let text = "[Rifter, Tackler]\n\nWarp Scrambler II\n";
        let err = facade.calculate_stats(text, Some(9)).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidParameter);
    }
}
