//! Hybrid name resolver (spec.md §4.6): case-insensitive, fuzzy item lookups
//! via a three-stage pipeline — process-local memory, persistent store,
//! upstream search — with write-through learning on a successful upstream
//! resolution. System/region resolution reuses the universe graph's own
//! name indexes directly (spec.md §4.3) since those never need an upstream
//! hop; this module is therefore scoped to item-type resolution, the one
//! name space the graph doesn't already own.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::ToolError;
use crate::store::PersistentStore;
use crate::types::ItemType;
use crate::upstream::rate_limit::MAX_BATCH_ITEMS;
use crate::upstream::UpstreamClient;

const SUGGESTION_LIMIT: usize = 3;

/// Process-local in-memory map, case-folded keys (spec.md §4.6 pipeline
/// stage 1). Shared across requests; writes only happen on a successful
/// upstream resolution (write-through learning).
#[derive(Default)]
struct MemoryIndex {
    by_name_lower: HashMap<String, ItemType>,
}

pub struct NameResolver {
    memory: RwLock<MemoryIndex>,
    store: PersistentStore,
    client: Arc<UpstreamClient>,
}

impl NameResolver {
    pub fn new(store: PersistentStore, client: Arc<UpstreamClient>) -> Self {
        Self {
            memory: RwLock::new(MemoryIndex::default()),
            store,
            client,
        }
    }

    /// Seed the in-memory map at startup from the bulk type table, so the
    /// common case never touches the persistent store at request time.
    pub fn preload(&self, items: &[ItemType]) {
        let mut mem = self.memory.write();
        for item in items {
            mem.by_name_lower.insert(item.name_lower.clone(), item.clone());
        }
    }

    /// Resolve a single item name to its stable id, walking the hybrid
    /// pipeline: memory -> persistent store -> upstream search, writing
    /// through to memory and the store on a successful upstream hit
    /// (spec.md §4.6). `resolve` is idempotent: re-resolving the canonical
    /// name returned by a previous call is a memory hit every time.
    pub async fn resolve(&self, name: &str) -> Result<ItemType, ToolError> {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return Err(ToolError::invalid_parameter("name", "item name must not be empty"));
        }

        if let Some(hit) = self.memory.read().by_name_lower.get(&key).cloned() {
            return Ok(hit);
        }

        if let Ok(Some(hit)) = self.store.get_type_by_name_lower(&key).await {
            self.memory.write().by_name_lower.insert(key.clone(), hit.clone());
            return Ok(hit);
        }

        match self.upstream_search(&key).await {
            Some(hit) => {
                info!(item = %hit.name, "resolved item name via upstream search, writing through");
                self.memory.write().by_name_lower.insert(key.clone(), hit.clone());
                let _ = self.store.upsert_type(&hit).await;
                Ok(hit)
            }
            None => {
                let suggestions = self.suggest(&key).await;
                Err(ToolError::type_not_found(name, suggestions))
            }
        }
    }

    /// Batch resolution: partition the requested names across the three
    /// pipeline stages, issuing upstream batch calls for whatever is left
    /// over after memory and store hits (spec.md §4.6 Batch resolution).
    /// The residual is chunked at [`MAX_BATCH_ITEMS`] so no single upstream
    /// request exceeds the per-host batch ceiling (spec.md §4.1).
    pub async fn resolve_many(&self, names: &[String]) -> (Vec<ItemType>, Vec<ToolError>) {
        let mut resolved = Vec::with_capacity(names.len());
        let mut unresolved_names = Vec::new();

        for name in names {
            let key = name.trim().to_lowercase();
            if let Some(hit) = self.memory.read().by_name_lower.get(&key).cloned() {
                resolved.push(hit);
                continue;
            }
            match self.store.get_type_by_name_lower(&key).await {
                Ok(Some(hit)) => {
                    self.memory.write().by_name_lower.insert(key.clone(), hit.clone());
                    resolved.push(hit);
                }
                _ => unresolved_names.push(name.clone()),
            }
        }

        let mut errors = Vec::new();
        if !unresolved_names.is_empty() {
            let mut hit_by_lower: HashMap<String, ItemType> = HashMap::new();
            for chunk in unresolved_names.chunks(MAX_BATCH_ITEMS) {
                if let Ok(hits) = crate::upstream::endpoints::search_item_types_batch(&self.client, chunk).await {
                    for hit in hits {
                        hit_by_lower.insert(hit.name_lower.clone(), hit);
                    }
                }
            }

            for name in &unresolved_names {
                let key = name.trim().to_lowercase();
                match hit_by_lower.get(&key).cloned() {
                    Some(hit) => {
                        self.memory.write().by_name_lower.insert(key.clone(), hit.clone());
                        let _ = self.store.upsert_type(&hit).await;
                        resolved.push(hit);
                    }
                    None => {
                        let suggestions = self.suggest(&key).await;
                        errors.push(ToolError::type_not_found(name, suggestions));
                    }
                }
            }
        }
        (resolved, errors)
    }

    /// Up to [`SUGGESTION_LIMIT`] substring matches from the persistent
    /// store, used to populate `TypeNotFound.data.suggestions`.
    async fn suggest(&self, needle: &str) -> Vec<String> {
        self.store
            .suggest_type_names(needle, SUGGESTION_LIMIT)
            .await
            .unwrap_or_default()
    }

    async fn upstream_search(&self, key: &str) -> Option<ItemType> {
        crate::upstream::endpoints::search_item_type(&self.client, key)
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_path() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite").to_str().unwrap().to_string();
        (dir, path)
    }

    fn item(id: u32, name: &str) -> ItemType {
        ItemType {
            id,
            name: name.to_string(),
            name_lower: name.to_lowercase(),
            group_id: 18,
            market_group_id: None,
        }
    }

    #[tokio::test]
    async fn preloaded_name_resolves_from_memory_without_store() {
        let (_dir, path) = store_path();
        let store = PersistentStore::open(&path).unwrap();
        let client = Arc::new(UpstreamClient::new(&crate::config::Config::from_env()));
        let resolver = NameResolver::new(store, client);
        resolver.preload(&[item(34, "Tritanium")]);

        let hit = resolver.resolve("tritanium").await.unwrap();
        assert_eq!(hit.id, 34);
    }

    #[tokio::test]
    async fn resolve_is_idempotent_on_canonical_name() {
        let (_dir, path) = store_path();
        let store = PersistentStore::open(&path).unwrap();
        let client = Arc::new(UpstreamClient::new(&crate::config::Config::from_env()));
        let resolver = NameResolver::new(store, client);
        resolver.preload(&[item(34, "Tritanium")]);

        let first = resolver.resolve("Tritanium").await.unwrap();
        let second = resolver.resolve(&first.name).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn unresolved_name_returns_type_not_found_with_suggestions() {
        let (_dir, path) = store_path();
        let store = PersistentStore::open(&path).unwrap();
        store.upsert_type(&item(34, "Tritanium")).await.unwrap();
        let client = Arc::new(UpstreamClient::new(&crate::config::Config::from_env()));
        let resolver = NameResolver::new(store, client);

        let err = resolver.resolve("tritanum").await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::TypeNotFound);
    }
}
