//! `rusqlite`-backed persistent store (spec.md §4.2), grounded on the
//! teacher's `VaultDb`: a `Connection` behind an `Arc<tokio::sync::Mutex<_>>`
//! for short-lived request-scoped access, WAL journal mode, `NORMAL`
//! synchronous pragma, `CREATE TABLE IF NOT EXISTS` migrations run once at
//! construction.

use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::types::{ItemType, PriceAggregate, Side};

fn side_to_str(side: Side) -> &'static str {
    side.as_str()
}

fn side_from_str(s: &str) -> Side {
    Side::parse(s).unwrap_or(Side::Buy)
}

#[derive(Clone)]
pub struct PersistentStore {
    conn: Arc<Mutex<Connection>>,
}

impl PersistentStore {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }
        let conn = Connection::open(path).context("open persistent store")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS aggregates (
                region_id INTEGER NOT NULL,
                item_id INTEGER NOT NULL,
                side TEXT NOT NULL,
                weighted_average REAL NOT NULL,
                min REAL NOT NULL,
                max REAL NOT NULL,
                median REAL NOT NULL,
                stddev REAL NOT NULL,
                volume REAL NOT NULL,
                order_count INTEGER NOT NULL,
                percentile REAL NOT NULL,
                last_updated INTEGER NOT NULL,
                PRIMARY KEY (region_id, item_id, side)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_aggregates_region_updated
                ON aggregates(region_id, last_updated DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS types (
                item_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                name_lower TEXT NOT NULL,
                group_id INTEGER NOT NULL,
                market_group_id INTEGER
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_types_name_lower ON types(name_lower)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// All-or-nothing batch upsert for a seed load (spec.md §4.2 Operations).
    pub async fn batch_upsert_aggregates(&self, rows: &[PriceAggregate]) -> Result<()> {
        let conn = self.conn.lock().await;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO aggregates
                    (region_id, item_id, side, weighted_average, min, max, median, stddev, volume, order_count, percentile, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(region_id, item_id, side) DO UPDATE SET
                    weighted_average = excluded.weighted_average,
                    min = excluded.min,
                    max = excluded.max,
                    median = excluded.median,
                    stddev = excluded.stddev,
                    volume = excluded.volume,
                    order_count = excluded.order_count,
                    percentile = excluded.percentile,
                    last_updated = excluded.last_updated",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.region_id,
                    row.item_id,
                    side_to_str(row.side),
                    row.weighted_average,
                    row.min,
                    row.max,
                    row.median,
                    row.stddev,
                    row.volume,
                    row.order_count,
                    row.percentile,
                    row.last_updated,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn get_aggregate(
        &self,
        region_id: u32,
        item_id: u32,
        side: Side,
    ) -> Result<Option<PriceAggregate>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT weighted_average, min, max, median, stddev, volume, order_count, percentile, last_updated
             FROM aggregates WHERE region_id = ?1 AND item_id = ?2 AND side = ?3",
        )?;
        let mut rows = stmt.query(params![region_id, item_id, side_to_str(side)])?;
        if let Some(row) = rows.next()? {
            Ok(Some(PriceAggregate {
                region_id,
                item_id,
                side,
                weighted_average: row.get(0)?,
                min: row.get(1)?,
                max: row.get(2)?,
                median: row.get(3)?,
                stddev: row.get(4)?,
                volume: row.get(5)?,
                order_count: row.get(6)?,
                percentile: row.get(7)?,
                last_updated: row.get(8)?,
            }))
        } else {
            Ok(None)
        }
    }

    /// Multi-key lookup for batch pricing (spec.md §4.2 Operations).
    pub async fn get_aggregates_multi(
        &self,
        region_id: u32,
        item_ids: &[u32],
    ) -> Result<Vec<PriceAggregate>> {
        let conn = self.conn.lock().await;
        let mut out = Vec::new();
        let mut stmt = conn.prepare_cached(
            "SELECT item_id, side, weighted_average, min, max, median, stddev, volume, order_count, percentile, last_updated
             FROM aggregates WHERE region_id = ?1 AND item_id = ?2",
        )?;
        for &item_id in item_ids {
            let mut rows = stmt.query(params![region_id, item_id])?;
            while let Some(row) = rows.next()? {
                out.push(PriceAggregate {
                    region_id,
                    item_id,
                    side: side_from_str(&row.get::<_, String>(1)?),
                    weighted_average: row.get(2)?,
                    min: row.get(3)?,
                    max: row.get(4)?,
                    median: row.get(5)?,
                    stddev: row.get(6)?,
                    volume: row.get(7)?,
                    order_count: row.get(8)?,
                    percentile: row.get(9)?,
                    last_updated: row.get(10)?,
                });
            }
        }
        Ok(out)
    }

    /// Newest aggregate timestamp for a region (spec.md §4.2 freshness query).
    pub async fn newest_timestamp(&self, region_id: u32) -> Result<Option<i64>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare_cached("SELECT MAX(last_updated) FROM aggregates WHERE region_id = ?1")?;
        let mut rows = stmt.query(params![region_id])?;
        if let Some(row) = rows.next()? {
            Ok(row.get(0)?)
        } else {
            Ok(None)
        }
    }

    pub async fn upsert_type(&self, item: &ItemType) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO types (item_id, name, name_lower, group_id, market_group_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(item_id) DO UPDATE SET
                name = excluded.name, name_lower = excluded.name_lower,
                group_id = excluded.group_id, market_group_id = excluded.market_group_id",
            params![
                item.id,
                item.name,
                item.name_lower,
                item.group_id,
                item.market_group_id,
            ],
        )?;
        Ok(())
    }

    /// All-or-nothing batch upsert for the bulk type seed.
    pub async fn batch_upsert_types(&self, items: &[ItemType]) -> Result<()> {
        let conn = self.conn.lock().await;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO types (item_id, name, name_lower, group_id, market_group_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(item_id) DO UPDATE SET
                    name = excluded.name, name_lower = excluded.name_lower,
                    group_id = excluded.group_id, market_group_id = excluded.market_group_id",
            )?;
            for item in items {
                stmt.execute(params![
                    item.id,
                    item.name,
                    item.name_lower,
                    item.group_id,
                    item.market_group_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub async fn get_type_by_name_lower(&self, name_lower: &str) -> Result<Option<ItemType>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT item_id, name, name_lower, group_id, market_group_id FROM types WHERE name_lower = ?1",
        )?;
        let mut rows = stmt.query(params![name_lower])?;
        if let Some(row) = rows.next()? {
            Ok(Some(ItemType {
                id: row.get(0)?,
                name: row.get(1)?,
                name_lower: row.get(2)?,
                group_id: row.get(3)?,
                market_group_id: row.get(4)?,
            }))
        } else {
            Ok(None)
        }
    }

    /// Up to `limit` item names whose lower-cased form contains `needle`,
    /// used as `TypeNotFound` suggestions (spec.md §4.6).
    pub async fn suggest_type_names(&self, needle: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let pattern = format!("%{}%", needle.to_lowercase());
        let mut stmt = conn.prepare_cached(
            "SELECT name FROM types WHERE name_lower LIKE ?1 ORDER BY name_lower LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached("SELECT value FROM metadata WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub async fn set_metadata(&self, key: &str, value: &str, updated_at: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO metadata (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, updated_at],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(region: u32, item: u32, side: Side, wa: f64) -> PriceAggregate {
        PriceAggregate {
            region_id: region,
            item_id: item,
            side,
            weighted_average: wa,
            min: wa - 1.0,
            max: wa + 1.0,
            median: wa,
            stddev: 0.0,
            volume: 10.0,
            order_count: 1,
            percentile: wa,
            last_updated: 1000,
        }
    }

    #[tokio::test]
    async fn batch_upsert_then_lookup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        let store = PersistentStore::open(path.to_str().unwrap()).unwrap();

        let rows = vec![agg(10000002, 34, Side::Buy, 5.0), agg(10000002, 34, Side::Sell, 6.0)];
        store.batch_upsert_aggregates(&rows).await.unwrap();

        let fetched = store.get_aggregate(10000002, 34, Side::Sell).await.unwrap().unwrap();
        assert_eq!(fetched.weighted_average, 6.0);

        let multi = store.get_aggregates_multi(10000002, &[34]).await.unwrap();
        assert_eq!(multi.len(), 2);
    }

    #[tokio::test]
    async fn type_lookup_is_case_insensitive_via_lower_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        let store = PersistentStore::open(path.to_str().unwrap()).unwrap();

        store
            .upsert_type(&ItemType {
                id: 34,
                name: "Tritanium".into(),
                name_lower: "tritanium".into(),
                group_id: 18,
                market_group_id: Some(1),
            })
            .await
            .unwrap();

        let found = store.get_type_by_name_lower("tritanium").await.unwrap();
        assert_eq!(found.unwrap().id, 34);

        let suggestions = store.suggest_type_names("trit", 3).await.unwrap();
        assert_eq!(suggestions, vec!["Tritanium".to_string()]);
    }
}
