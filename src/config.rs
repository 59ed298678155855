//! Process configuration, populated from environment variables.
//!
//! Follows the teacher's pattern in `models::Config` / `main.rs`'s
//! `DataSourceKillSwitch::new`: read with `env::var(..).ok()`, parse, fall
//! back to a documented default. `.env` is loaded once at process start via
//! `dotenv`.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub graph_path: String,
    pub graph_source_json: String,
    pub cache_snapshot_dir: String,
    pub manifest_path: String,
    pub allow_unpinned_data: bool,
    pub log_level: String,
    pub upstream_base_url: String,
    pub user_agent_contact: String,
    pub http_port: u16,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            database_path: env_or("NOVAROUTE_DB_PATH", "data/novaroute.sqlite"),
            graph_path: env_or("NOVAROUTE_GRAPH_PATH", "data/universe.graph"),
            graph_source_json: env_or("NOVAROUTE_GRAPH_SOURCE", "data/universe.json"),
            cache_snapshot_dir: env_or("NOVAROUTE_CACHE_DIR", "data/cache"),
            manifest_path: env_or("NOVAROUTE_MANIFEST_PATH", "data/manifest.sha256.json"),
            allow_unpinned_data: env_bool("NOVAROUTE_ALLOW_UNPINNED", false),
            log_level: env_or("NOVAROUTE_LOG_LEVEL", "info"),
            upstream_base_url: env_or("NOVAROUTE_UPSTREAM_BASE_URL", "https://esi.example-game.com"),
            user_agent_contact: env_or(
                "NOVAROUTE_CONTACT",
                "novaroute-tactical-intel (contact: ops@example.invalid)",
            ),
            http_port: env_parsed("NOVAROUTE_HTTP_PORT", 8088),
        }
    }
}

/// Default per-upstream-call timeout, including retries (spec.md §5).
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
/// Ceiling for galaxy-wide bulk calls (kills, jumps, faction warfare).
pub const BULK_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);
