//! Static-data queries (spec.md §4.7 `sde(action, …)`): read-only lookups
//! over the two sources of truth that never change after process start —
//! the universe graph's system/constellation/region index and the
//! persistent store's item-type table.
//!
//! "Sde" names the upstream game's static-data-export convention; here it
//! is just the façade over reference data the dispatcher already owns, not
//! a separate data source.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{ToolError, ToolResult};
use crate::resolver::NameResolver;
use crate::store::PersistentStore;
use crate::universe::UniverseGraph;

pub struct SdeService {
    graph: Arc<UniverseGraph>,
    store: PersistentStore,
    resolver: Arc<NameResolver>,
}

#[derive(Debug, Serialize)]
pub struct SystemInfoResult {
    pub name: String,
    pub security: f32,
    pub security_class: String,
    pub constellation_id: u32,
    pub region_id: u32,
    pub is_border: bool,
    pub neighbor_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ItemInfoResult {
    pub id: u32,
    pub name: String,
    pub group_id: u32,
    pub market_group_id: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ItemSearchResult {
    pub total_found: usize,
    pub items: Vec<String>,
}

impl SdeService {
    pub fn new(graph: Arc<UniverseGraph>, store: PersistentStore, resolver: Arc<NameResolver>) -> Self {
        Self { graph, store, resolver }
    }

    /// `action="system_info"`: look up a system by name.
    pub fn system_info(&self, name: &str) -> ToolResult<SystemInfoResult> {
        let idx = self
            .graph
            .index_of_name(name)
            .ok_or_else(|| ToolError::system_not_found(name, self.graph.suggest_names(name, 3)))?;
        Ok(SystemInfoResult {
            name: self.graph.name[idx].clone(),
            security: self.graph.security[idx],
            security_class: self.graph.security_class(idx).as_str().to_string(),
            constellation_id: self.graph.constellation_id[idx],
            region_id: self.graph.region_id[idx],
            is_border: self.graph.is_border(idx),
            neighbor_count: self.graph.neighbors(idx).len(),
        })
    }

    /// `action="item_info"`: resolve an item name through the shared
    /// resolver and return its static reference fields.
    pub async fn item_info(&self, name: &str) -> ToolResult<ItemInfoResult> {
        let item = self.resolver.resolve(name).await?;
        Ok(ItemInfoResult {
            id: item.id,
            name: item.name,
            group_id: item.group_id,
            market_group_id: item.market_group_id,
        })
    }

    /// `action="search_items"`: substring search over the persistent
    /// store's type table, `limit` documented range `[1,100]`.
    pub async fn search_items(&self, query: &str, limit: u32) -> ToolResult<ItemSearchResult> {
        if !(1..=100).contains(&limit) {
            return Err(ToolError::invalid_parameter("limit", "must be in 1..=100"));
        }
        if query.trim().is_empty() {
            return Err(ToolError::invalid_parameter("query", "must not be empty"));
        }
        let items = self
            .store
            .suggest_type_names(&query.to_lowercase(), limit as usize)
            .await
            .unwrap_or_default();
        Ok(ItemSearchResult {
            total_found: items.len(),
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::ItemType;
    use crate::universe::graph::build_graph;
    use crate::universe::system::{RawGate, RawSystem, UniverseSourceDocument};
    use crate::upstream::UpstreamClient;

    fn fixture_graph() -> Arc<UniverseGraph> {
        let doc = UniverseSourceDocument {
            systems: vec![
                RawSystem {
                    id: 1,
                    name: "Jita".to_string(),
                    security: 0.9,
                    constellation_id: 10,
                    region_id: 100,
                    constellation_name: None,
                    region_name: None,
                },
                RawSystem {
                    id: 2,
                    name: "Perimeter".to_string(),
                    security: 0.9,
                    constellation_id: 10,
                    region_id: 100,
                    constellation_name: None,
                    region_name: None,
                },
            ],
            gates: vec![RawGate {
                from_system_id: 1,
                to_system_id: 2,
            }],
        };
        Arc::new(build_graph(doc).unwrap())
    }

    async fn test_services() -> SdeService {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite").to_str().unwrap().to_string();
        let store = PersistentStore::open(&path).unwrap();
        let client = Arc::new(UpstreamClient::new(&Config::from_env()));
        let resolver = Arc::new(NameResolver::new(store.clone(), client));
        store
            .upsert_type(&ItemType {
                id: 34,
                name: "Tritanium".to_string(),
                name_lower: "tritanium".to_string(),
                group_id: 18,
                market_group_id: None,
            })
            .await
            .unwrap();
        resolver.preload(&[ItemType {
            id: 34,
            name: "Tritanium".to_string(),
            name_lower: "tritanium".to_string(),
            group_id: 18,
            market_group_id: None,
        }]);
        std::mem::forget(dir);
        SdeService::new(fixture_graph(), store, resolver)
    }

    #[tokio::test]
    async fn item_info_resolves_known_item() {
        let svc = test_services().await;
        let info = svc.item_info("tritanium").await.unwrap();
        assert_eq!(info.id, 34);
    }

    #[tokio::test]
    async fn search_items_rejects_out_of_range_limit() {
        let svc = test_services().await;
        let err = svc.search_items("trit", 0).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn system_info_returns_known_system() {
        let svc = test_services().await;
        let info = svc.system_info("jita").await.unwrap();
        assert_eq!(info.name, "Jita");
        assert_eq!(info.security_class, "high");
    }

    #[tokio::test]
    async fn system_info_unknown_name_returns_system_not_found() {
        let svc = test_services().await;
        let err = svc.system_info("Nonexistent").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::SystemNotFound);
    }
}
