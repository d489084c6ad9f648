//! Schemagraph CLI - Build and query a schema knowledge graph
//!
//! Usage:
//!   schemagraph introspect <snapshot.json> [--database <name>] [--schema <owner>]
//!   schemagraph search <words>... [--threshold <0..1>]
//!   schemagraph context <table>...
//!   schemagraph inferred [--stats]
//!
//! Examples:
//!   schemagraph introspect catalog.json --database sales
//!   schemagraph search usr info --threshold 0.6
//!   schemagraph context ORDERS ORDER_ITEMS

use clap::{Parser, Subcommand};
use schemagraph::config::Settings;
use schemagraph::metadata::SnapshotProvider;
use schemagraph::SchemaGraphService;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemagraph")]
#[command(about = "Schemagraph - A schema knowledge graph with inferred foreign keys")]
#[command(version)]
struct Cli {
    /// Path to a TOML settings file (overrides the default search path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the graph store database
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Introspect a metadata snapshot into the graph store
    Introspect {
        /// Path to the JSON metadata snapshot
        snapshot: PathBuf,

        /// Database name (defaults to store.default_database_name)
        #[arg(short, long)]
        database: Option<String>,

        /// Only introspect tables of this schema/owner
        #[arg(long)]
        schema: Option<String>,
    },

    /// Fuzzy search stored tables and columns
    Search {
        /// Query words
        #[arg(required = true)]
        words: Vec<String>,

        /// Minimum similarity score (defaults to search.similarity_threshold)
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Show tables, their columns and relationships
    Context {
        /// Table names
        #[arg(required = true)]
        tables: Vec<String>,
    },

    /// List inferred relationships
    Inferred {
        /// Print confidence statistics instead of the relationships
        #[arg(long)]
        stats: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match load_settings(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let service = match SchemaGraphService::open(settings) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening graph store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Introspect {
            snapshot,
            database,
            schema,
        } => cmd_introspect(&service, snapshot, database, schema).await,
        Commands::Search { words, threshold } => {
            print_result(service.search(&words.join(" "), threshold).await)
        }
        Commands::Context { tables } => print_result(service.context(&tables).await),
        Commands::Inferred { stats } => {
            if stats {
                print_result(service.inferred_statistics().await)
            } else {
                print_result(service.inferred_relationships().await)
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => {
            let mut settings = Settings::from_file(path)?;
            settings.apply_overrides(|key| std::env::var(key).ok())?;
            settings.validate()?;
            settings
        }
        None => Settings::load()?,
    };
    if let Some(store) = &cli.store {
        settings.store.path = Some(store.display().to_string());
    }
    Ok(settings)
}

async fn cmd_introspect(
    service: &SchemaGraphService,
    snapshot: PathBuf,
    database: Option<String>,
    schema: Option<String>,
) -> ExitCode {
    let provider = match SnapshotProvider::from_path(&snapshot) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error reading snapshot '{}': {}", snapshot.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let result = service
        .introspect(&provider, database.as_deref(), schema.as_deref(), &cancel)
        .await;
    print_result(result)
}

fn print_result<T: Serialize>(result: schemagraph::Result<T>) -> ExitCode {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
