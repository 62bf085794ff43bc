//! CLI command implementations for `sidx init`, `sidx index`, and
//! `sidx search`.
//!
//! Each command builds [`Services`] from config, initializes the store in
//! the foreground, and prints its outcome to stdout.

use anyhow::{Context, Result};
use std::path::Path;

use session_index_core::IndexOutcome;

use crate::config::{Config, StoreBackend};
use crate::services::Services;

async fn ready_services(config: &Config) -> Result<Services> {
    let services = Services::from_config(config)?;
    services
        .initialize()
        .await
        .context("vector store failed to initialize")?;
    Ok(services)
}

/// Connect to (and create, if needed) the configured collection.
pub async fn run_init(config: &Config) -> Result<()> {
    let services = ready_services(config).await?;
    println!(
        "Vector store ready ({:?} backend, metric {}): {}",
        config.store.backend,
        config.store.metric,
        services.store_state()
    );
    Ok(())
}

/// Index one file from disk under `virtual_path` (defaults to `path`).
pub async fn run_index(
    config: &Config,
    path: &Path,
    session: &str,
    virtual_path: Option<&str>,
) -> Result<()> {
    if config.store.backend == StoreBackend::Memory {
        tracing::warn!("memory backend: indexed entries are discarded when this command exits");
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_path = virtual_path
        .map(str::to_string)
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    let services = ready_services(config).await?;
    let outcome = services
        .indexer
        .index_file(&file_path, &content, session)
        .await?;

    match outcome {
        IndexOutcome::Indexed { chunk_count } => {
            println!("Indexed {} ({} chunks) for session {}", file_path, chunk_count, session)
        }
        IndexOutcome::Skipped(reason) => {
            println!("Skipped {} ({:?})", file_path, reason)
        }
    }
    Ok(())
}

/// Search one session and print ranked results.
pub async fn run_search(
    config: &Config,
    query: &str,
    session: &str,
    top_k: Option<usize>,
) -> Result<()> {
    let services = ready_services(config).await?;
    let results = services.retriever.search(query, session, top_k).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, r.score, r.file_path);
        for line in r.content.lines().take(3) {
            println!("    {}", line);
        }
        println!();
    }
    Ok(())
}
