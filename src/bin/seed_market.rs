//! Bootstrap binary (spec.md §4.9): loads a bulk market-aggregate CSV dump
//! into the persistent store after verifying it against the integrity
//! manifest. Row parsing fans out across a `rayon` thread pool since a
//! full-region seed file can run into the hundreds of thousands of rows.

use std::fs;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use tracing::{info, warn};

use novaroute_backend::config::Config;
use novaroute_backend::store::integrity::{self, Manifest};
use novaroute_backend::store::PersistentStore;
use novaroute_backend::types::{PriceAggregate, Side};

#[derive(Parser, Debug)]
#[command(name = "seed_market")]
#[command(about = "Bulk-load a market aggregate CSV dump into the persistent store")]
struct Args {
    /// Path to the CSV file (region_id,item_id,side,weighted_average,min,max,median,stddev,volume,order_count,percentile,last_updated).
    #[arg(long)]
    csv: String,

    /// Path to the persistent store database (defaults to the configured one).
    #[arg(long)]
    database: Option<String>,

    /// Skip the integrity manifest check (development only).
    #[arg(long, default_value_t = false)]
    skip_integrity: bool,
}

#[derive(serde::Deserialize)]
struct CsvRow {
    region_id: u32,
    item_id: u32,
    side: String,
    weighted_average: f64,
    min: f64,
    max: f64,
    median: f64,
    stddev: f64,
    volume: f64,
    order_count: u32,
    percentile: f64,
    last_updated: i64,
}

impl CsvRow {
    fn into_aggregate(self) -> Result<PriceAggregate> {
        let side = Side::parse(&self.side).with_context(|| format!("invalid side `{}`", self.side))?;
        Ok(PriceAggregate {
            region_id: self.region_id,
            item_id: self.item_id,
            side,
            weighted_average: self.weighted_average,
            min: self.min,
            max: self.max,
            median: self.median,
            stddev: self.stddev,
            volume: self.volume,
            order_count: self.order_count,
            percentile: self.percentile,
            last_updated: self.last_updated,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let config = Config::from_env();

    let bytes = fs::read(&args.csv).with_context(|| format!("reading {}", args.csv))?;

    if args.skip_integrity || config.allow_unpinned_data {
        warn!(path = %args.csv, "seeding without integrity verification");
    } else {
        let manifest = Manifest::load(&config.manifest_path)
            .with_context(|| format!("loading manifest at {}", config.manifest_path))?;
        integrity::verify(&manifest, &args.csv, &bytes, false)
            .map_err(|e| anyhow::anyhow!("{}", e.message))?;
    }

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let rows: Vec<CsvRow> = reader
        .deserialize()
        .collect::<Result<Vec<CsvRow>, csv::Error>>()
        .context("parsing CSV rows")?;

    if rows.is_empty() {
        bail!("CSV file contained no rows");
    }
    info!(rows = rows.len(), "parsed CSV rows, converting in parallel");

    let aggregates: Vec<PriceAggregate> = rows
        .into_par_iter()
        .map(CsvRow::into_aggregate)
        .collect::<Result<Vec<_>>>()?;

    let db_path = args.database.unwrap_or(config.database_path.clone());
    let store = PersistentStore::open(&db_path)?;

    const BATCH_SIZE: usize = 2000;
    for chunk in aggregates.chunks(BATCH_SIZE) {
        store.batch_upsert_aggregates(chunk).await?;
    }

    info!(count = aggregates.len(), database = %db_path, "seed complete");
    Ok(())
}
