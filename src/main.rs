//! # Session Index CLI (`sidx`)
//!
//! ## Usage
//!
//! ```bash
//! sidx --config ./config/sidx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sidx init` | Connect to the vector store and create the collection |
//! | `sidx index <path> --session <id>` | Index one file for a session |
//! | `sidx search "<query>" --session <id>` | Search a session's chunks |
//! | `sidx serve` | Start the HTTP server |
//!
//! Log verbosity is controlled with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use session_index::{commands, config, server};

/// Session Index: session-scoped semantic search over virtual files.
#[derive(Parser)]
#[command(name = "sidx", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// See `config/sidx.example.toml` for every option.
    #[arg(long, global = true, default_value = "./config/sidx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the vector store and create the collection if needed.
    Init,

    /// Index one file for a session.
    Index {
        /// File to read from disk.
        path: PathBuf,

        /// Session (chat) id the file belongs to.
        #[arg(long)]
        session: String,

        /// Virtual path to store the file under (defaults to `path`).
        #[arg(long = "as")]
        virtual_path: Option<String>,
    },

    /// Search a session's indexed chunks.
    Search {
        query: String,

        #[arg(long)]
        session: String,

        /// Number of results (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Index {
            path,
            session,
            virtual_path,
        } => commands::run_index(&cfg, &path, &session, virtual_path.as_deref()).await?,
        Commands::Search {
            query,
            session,
            top_k,
        } => commands::run_search(&cfg, &query, &session, top_k).await?,
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}
