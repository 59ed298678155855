//! Bootstrap binary (spec.md §4.9): reads the raw universe JSON document
//! (systems + gates), builds the in-memory graph, validates its
//! invariants, and writes the hand-rolled binary form the running service
//! loads at startup. Run once per universe-data refresh, not per deploy.

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use novaroute_backend::config::Config;
use novaroute_backend::store::integrity;
use novaroute_backend::universe::graph::build_graph;
use novaroute_backend::universe::serialize::save_to_path;
use novaroute_backend::universe::system::UniverseSourceDocument;

#[derive(Parser, Debug)]
#[command(name = "build_graph")]
#[command(about = "Build the serialized universe graph from a raw systems/gates JSON document")]
struct Args {
    /// Path to the source JSON document (systems + gates).
    #[arg(long)]
    source: Option<String>,

    /// Path to write the serialized graph.
    #[arg(long)]
    out: Option<String>,

    /// Update the integrity manifest with the new graph's checksum.
    #[arg(long, default_value_t = false)]
    update_manifest: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let config = Config::from_env();

    let source_path = args.source.unwrap_or(config.graph_source_json.clone());
    let out_path = args.out.unwrap_or(config.graph_path.clone());

    info!(source = %source_path, out = %out_path, "building universe graph");

    let raw = fs::read(&source_path).with_context(|| format!("reading {source_path}"))?;
    let doc: UniverseSourceDocument = serde_json::from_slice(&raw).with_context(|| "parsing universe source document")?;

    let graph = build_graph(doc).context("building graph")?;
    graph.validate_invariants().context("graph failed invariant checks")?;
    info!(systems = graph.len(), "graph built");

    save_to_path(&graph, &out_path).with_context(|| format!("writing {out_path}"))?;

    if args.update_manifest {
        let bytes = fs::read(&out_path)?;
        let mut manifest = integrity::Manifest::load(&config.manifest_path).unwrap_or_default();
        manifest.checksums.insert(out_path.clone(), integrity::sha256_hex(&bytes));
        manifest.save(&config.manifest_path)?;
        info!(manifest = %config.manifest_path, "manifest updated");
    }

    info!("build_graph complete");
    Ok(())
}
