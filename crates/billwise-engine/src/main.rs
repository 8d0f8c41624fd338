//! # billwise
//!
//! Runs one catalog function against the local database and prints the
//! result envelope as JSON.
//!
//! ## Usage
//! ```text
//! billwise [--config FILE] [--owner ID] catalog
//! billwise [--config FILE] [--owner ID] call <function> ['{"json": "arguments"}']
//! ```
//!
//! The owner defaults to `BILLWISE_OWNER_ID`, then `local`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use billwise_db::{Database, DbConfig};
use billwise_engine::{catalog_json, init_tracing, Dispatcher, EngineConfig};

#[derive(Parser, Debug)]
#[command(name = "billwise")]
#[command(about = "Run Billwise catalog functions against the local database")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Owner the call runs as.
    #[arg(long = "owner", env = "BILLWISE_OWNER_ID", default_value = "local", global = true)]
    owner_id: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the function catalog as JSON.
    Catalog,
    /// Execute one function and print its result envelope.
    Call {
        function: String,
        /// Arguments as a JSON object.
        #[arg(default_value = "{}", value_parser = parse_arguments)]
        arguments: Value,
    },
}

fn parse_arguments(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON: {}", e))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log_filter);

    let (function, arguments) = match cli.command {
        Command::Catalog => {
            println!("{}", serde_json::to_string_pretty(&catalog_json())?);
            return Ok(());
        }
        Command::Call {
            function,
            arguments,
        } => (function, arguments),
    };

    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    info!(path = %config.database_path.display(), "Opening database");
    let db = Database::new(DbConfig::new(config.database_path.clone())).await?;

    let dispatcher = Dispatcher::new(db, config);
    let result = dispatcher.execute(&function, arguments, &cli.owner_id).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
