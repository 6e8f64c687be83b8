//! # Collection Harness CLI (`colh`)
//!
//! ## Usage
//!
//! ```bash
//! colh --config ./config/colh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `colh init` | Create the SQLite database and run schema migrations |
//! | `colh ingest --name <c> --files <dir>` | Load a directory of text files into a collection |
//! | `colh query "<text>"` | Print the two closest documents |
//! | `colh ping-store` | Store heartbeat in nanoseconds |
//! | `colh collections` | List collections with document counts |
//! | `colh serve` | Start the MCP server (stdio or HTTP) |
//!
//! Logs are written to stderr; set `RUST_LOG` to change the level.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use collection_harness::config::{self, Config, Transport};
use collection_harness::{collections, db, ingest, migrate, query, server};

const DEFAULT_CONFIG: &str = "./config/colh.toml";

/// Collection Harness: ingest local text files into a vector collection
/// and serve similarity queries over MCP.
#[derive(Parser)]
#[command(name = "colh", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/colh.toml`; built-in defaults are used when
    /// that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database file and schema. Safe to run repeatedly.
    Init,

    /// Load every accepted file in a directory into a collection.
    ///
    /// Accepted suffixes: .md .mkd .txt .text .html (case-sensitive,
    /// non-recursive).
    Ingest {
        /// Collection name (created if absent).
        #[arg(long)]
        name: String,

        /// Directory to scan.
        #[arg(long)]
        files: PathBuf,

        /// List accepted files without touching the store.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a similarity query and print the matching texts.
    Query {
        query_text: String,

        /// Only consider documents containing this exact substring.
        #[arg(long)]
        exact: Option<String>,

        /// Collection to query instead of `[query].collection`.
        #[arg(long)]
        collection: Option<String>,
    },

    /// Round trip to the store and print its heartbeat.
    PingStore,

    /// List collections and their document counts.
    Collections,

    /// Start the MCP tool server.
    Serve {
        /// Overrides `[server].transport`.
        #[arg(long, value_enum)]
        transport: Option<Transport>,
    },
}

fn resolve_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(&path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            if default.exists() {
                config::load_config(&default)
            } else {
                tracing::debug!("no config file at {}, using defaults", DEFAULT_CONFIG);
                Ok(Config::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = resolve_config(cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.store.path).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            name,
            files,
            dry_run,
        } => {
            ingest::run_ingest(&cfg, &name, &files, dry_run).await?;
        }
        Commands::Query {
            query_text,
            exact,
            collection,
        } => {
            query::run_query(&cfg, &query_text, exact, collection).await?;
        }
        Commands::PingStore => {
            query::run_ping_store(&cfg).await?;
        }
        Commands::Collections => {
            collections::list_collections(&cfg).await?;
        }
        Commands::Serve { transport } => {
            let transport = transport.unwrap_or(cfg.server.transport);
            server::run_server(&cfg, transport).await?;
        }
    }

    Ok(())
}
