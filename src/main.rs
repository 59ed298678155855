//! Process entrypoint for `novaroute`: wires configuration, the universe
//! graph, upstream client, caches, persistent store and resolver into a
//! [`Dispatcher`], then either serves the HTTP tool surface (default, and
//! `serve`) or runs a single CLI tool call and exits (spec.md §6).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use novaroute_backend::api::{self, AppState};
use novaroute_backend::cli::{self, Cli, Command};
use novaroute_backend::config::Config;
use novaroute_backend::dispatcher::Dispatcher;
use novaroute_backend::resolver::NameResolver;
use novaroute_backend::store::PersistentStore;
use novaroute_backend::universe::serialize::load_from_path;
use novaroute_backend::upstream::UpstreamClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .init();

    info!(graph_path = %config.graph_path, database = %config.database_path, "starting novaroute");

    let graph = Arc::new(
        load_from_path(&config.graph_path)
            .with_context(|| format!("loading universe graph from {}", config.graph_path))?,
    );
    let store = PersistentStore::open(&config.database_path)
        .with_context(|| format!("opening persistent store at {}", config.database_path))?;
    let client = Arc::new(UpstreamClient::new(&config));
    let resolver = Arc::new(NameResolver::new(store.clone(), client.clone()));

    let dispatcher = Arc::new(Dispatcher::new(graph, store, client, resolver));
    dispatcher.volatile.load_snapshot(&config.cache_snapshot_dir);

    match cli.command {
        Command::Serve => serve(dispatcher, config).await,
        other => {
            let code = cli::run(&dispatcher, other).await;
            std::process::exit(code);
        }
    }
}

/// Periodically flushes the volatile cache to `cache_snapshot_dir` so a
/// restart isn't a cold start (spec.md §6 on-disk snapshot directory). Half
/// the shorter of the two TTLs it covers, so a crash loses at most one cycle.
const SNAPSHOT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);

async fn serve(dispatcher: Arc<Dispatcher>, config: Config) -> Result<()> {
    let snapshot_dispatcher = dispatcher.clone();
    let snapshot_dir = config.cache_snapshot_dir.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SNAPSHOT_INTERVAL);
        ticker.tick().await; // skip the immediate first tick, nothing to save yet
        loop {
            ticker.tick().await;
            if let Err(e) = snapshot_dispatcher.volatile.save_snapshot(&snapshot_dir) {
                tracing::warn!(error = %e, "failed to write volatile cache snapshot");
            }
        }
    });

    let state = AppState { dispatcher };
    let app = api::router(state).layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    info!(%addr, "tool surface listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;
    Ok(())
}
