//! Command-line interface (spec.md §6): a `clap` derive subcommand per
//! tool action, mirroring `src/bin/dataset_inspect.rs`'s
//! `Parser`/`Subcommand` shape. Each subcommand prints the same JSON the
//! HTTP tool surface would return, with exit codes documented in spec.md
//! §6: 0 on success, 1 on an unrecoverable error, 2 when an upstream call
//! fails with no cached fallback, 3 on an integrity failure.

use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::dispatcher::Dispatcher;
use crate::error::ErrorKind;

#[derive(Parser, Debug)]
#[command(name = "novaroute")]
#[command(about = "Navigation and market intelligence tool surface")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP tool surface (default when no subcommand is given).
    Serve,
    /// Call the `universe` tool with a raw JSON action payload.
    Universe {
        /// JSON object, e.g. '{"action":"route","origin":"Jita","destination":"Amarr"}'
        json: String,
    },
    /// Call the `market` tool with a raw JSON action payload.
    Market { json: String },
    /// Call the `sde` tool with a raw JSON action payload.
    Sde { json: String },
    /// Call the `skills` tool with a raw JSON action payload.
    Skills { json: String },
    /// Call the `fitting` tool with a raw JSON action payload.
    Fitting { json: String },
    /// Print dispatcher/cache status as JSON.
    Status,
}

/// Runs a single CLI invocation against an already-constructed dispatcher
/// and returns the process exit code (spec.md §6).
pub async fn run(dispatcher: &Dispatcher, command: Command) -> i32 {
    let result = match command {
        Command::Serve => return 0,
        Command::Universe { json } => parse_then(&json, |v| dispatcher.universe(v)).await,
        Command::Market { json } => parse_then(&json, |v| dispatcher.market(v)).await,
        Command::Sde { json } => parse_then(&json, |v| dispatcher.sde(v)).await,
        Command::Skills { json } => parse_then(&json, |v| dispatcher.skills(v)).await,
        Command::Fitting { json } => parse_then(&json, |v| dispatcher.fitting(v)).await,
        Command::Status => Ok(dispatcher.status().await),
    };

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            0
        }
        Err(err) => {
            eprintln!("{}", serde_json::to_string_pretty(&err.to_envelope()).unwrap_or_default());
            match err.kind {
                ErrorKind::IntegrityError => 3,
                ErrorKind::SourceUnavailable | ErrorKind::RateLimited => 2,
                _ => 1,
            }
        }
    }
}

async fn parse_then<F, Fut>(json: &str, call: F) -> Result<Value, crate::error::ToolError>
where
    F: FnOnce(Value) -> Fut,
    Fut: std::future::Future<Output = Result<Value, crate::error::ToolError>>,
{
    let value: Value = serde_json::from_str(json)
        .map_err(|e| crate::error::ToolError::invalid_parameter("json", format!("malformed JSON: {e}")))?;
    call(value).await
}
