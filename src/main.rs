use csvscope::{schema_context, Config, CsvSource, StorageStrategy, Workspace};

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "csvscope")]
#[command(about = "Load a CSV into a typed table, then profile and query it")]
#[command(version)]
struct Args {
    /// Ingestion strategy (or set CSVSCOPE_STRATEGY)
    #[arg(long, global = true, value_enum)]
    strategy: Option<StorageStrategy>,

    /// Rows sampled for type inference by the native strategy, 0 = all
    #[arg(long, global = true)]
    infer_schema_length: Option<usize>,

    /// Rows shown in the schema snapshot
    #[arg(long, global = true)]
    sample_rows: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a CSV and print the resulting columns and row count
    Load {
        /// CSV file, or - for stdin
        csv: PathBuf,
    },
    /// Load a CSV and print per-column statistics
    Stats {
        /// CSV file, or - for stdin
        csv: PathBuf,
    },
    /// Load a CSV and run a read-only SQL query against `tablename`
    Query {
        /// CSV file, or - for stdin
        csv: PathBuf,

        /// SELECT statement
        sql: String,
    },
    /// Load a CSV and print the schema context used for query assistants
    Schema {
        /// CSV file, or - for stdin
        csv: PathBuf,
    },
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;
    let workspace = Workspace::new(config)?;
    debug!("Configuration: {:?}", workspace.config());

    match args.command {
        Commands::Load { csv } => {
            let summary = workspace.load(&csv_source(&csv)?)?;
            print_json(&summary)
        }
        Commands::Stats { csv } => {
            workspace.load(&csv_source(&csv)?)?;
            print_json(&workspace.summarize()?)
        }
        Commands::Query { csv, sql } => {
            workspace.load(&csv_source(&csv)?)?;
            let result = workspace.query(&sql)?;
            info!("Query returned {} rows", result.row_count());
            print_json(&result)
        }
        Commands::Schema { csv } => {
            workspace.load(&csv_source(&csv)?)?;
            let snapshot = workspace.schema_snapshot()?;
            print!("{}", schema_context(snapshot.as_ref()));
            Ok(())
        }
    }
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to read configuration: {}", e))?;

    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(rows) = args.infer_schema_length {
        config.infer_schema_length = if rows == 0 { None } else { Some(rows) };
    }
    if let Some(rows) = args.sample_rows {
        config.sample_rows = rows;
    }
    Ok(config)
}

fn csv_source(csv: &Path) -> Result<CsvSource> {
    if csv.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin().read_to_end(&mut bytes)?;
        Ok(CsvSource::from_bytes(bytes))
    } else {
        Ok(CsvSource::from_path(csv))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
