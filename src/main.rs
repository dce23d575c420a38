//! # kb CLI
//!
//! The `kb` binary drives the knowledge base: schema creation, incremental
//! PDF ingestion, retrieval debugging, statistics, and the HTTP service.
//!
//! ## Usage
//!
//! ```bash
//! kb --config ./config/kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb init` | Create the SQLite vector store |
//! | `kb ingest` | Ingest new and modified PDFs |
//! | `kb search "<query>" --org <ORG>` | Show what retrieval returns for an organization |
//! | `kb stats` | Chunk counts per organization |
//! | `kb serve` | Start the HTTP service |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kb_rag::ingest::IngestOptions;
use kb_rag::progress::ProgressMode;
use kb_rag::{config, ingest, migrate, search, server, stats};

/// kb: ingest PDFs into a vector store and answer questions about them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means all defaults.
#[derive(Parser)]
#[command(
    name = "kb",
    about = "Organization-scoped RAG over PDF documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the vector store schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Ingest new and modified PDFs.
    ///
    /// Files whose content hash matches the manifest are skipped. Failed
    /// files are reported and retried on the next run.
    Ingest {
        /// Ignore the manifest and re-ingest every PDF.
        #[arg(long)]
        full: bool,

        /// Show which files would be ingested without touching the store
        /// or the manifest.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr: `human`, `json`, or `off`. Defaults to
        /// `human` when stderr is a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Run a filtered similarity search and print the hits.
    Search {
        /// The search query string.
        query: String,

        /// Organization to search (case-insensitive; `GLOBAL` for shared documents).
        #[arg(long)]
        org: String,

        /// Maximum number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show vector store statistics.
    Stats,

    /// Start the HTTP service.
    ///
    /// Serves `/api/chat`, `/api/summary`, `/api/health`, and the static
    /// front-end. The port comes from `PORT` when set.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .ok();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Vector store initialized at {}.", cfg.db.path.display());
        }
        Commands::Ingest {
            full,
            dry_run,
            progress,
        } => {
            let mode = ProgressMode::from_flag(progress.as_deref())?;
            ingest::run_ingest(&cfg, IngestOptions { full, dry_run }, mode).await?;
        }
        Commands::Search { query, org, limit } => {
            search::run_search(&cfg, &query, &org, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
