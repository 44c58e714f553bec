//! Ingest command - loads a labelled corpus into the vector store

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::domain::RequestContext;

/// Arguments for the ingest command
#[derive(Args, Clone, Debug)]
pub struct IngestArgs {
    /// Path to a .jsonl or .csv file of labelled prompts
    #[arg(required_unless_present = "rebuild_cache")]
    pub file: Option<PathBuf>,

    /// Records embedded per batch
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Skip building the vector similarity index after inserting
    #[arg(long)]
    pub skip_index: bool,

    /// Do not write malicious records to the cache
    #[arg(long)]
    pub skip_cache: bool,

    /// Parse and validate the file without embedding or writing anything
    #[arg(long, visible_alias = "validate-only")]
    pub dry_run: bool,

    /// Clear the cache and re-warm it from the vector store's malicious records
    #[arg(long, conflicts_with_all = ["file", "skip_cache", "dry_run"])]
    pub rebuild_cache: bool,
}

/// Ingest `args.file`, or rebuild the cache, and print the outcome as JSON
pub async fn run(config_dir: &str, args: IngestArgs) -> anyhow::Result<()> {
    let mut config = super::bootstrap(config_dir)?;
    // The file named on the command line replaces the startup seed
    config.store.seed_file = None;

    let components = crate::build_components(&config).await?;
    let mut service = components
        .ingestion_service()
        .with_batch_size(args.batch_size)
        .with_index_build(!args.skip_index)
        .with_dry_run(args.dry_run);
    if args.skip_cache {
        service = service.without_cache();
    }

    let (ctx, handle) = RequestContext::background().cancellable();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    if args.rebuild_cache {
        let warmed = service
            .rebuild_cache(&ctx)
            .await
            .context("Cache rebuild failed")?;
        println!("{}", serde_json::json!({ "cache_warmed": warmed }));
        return Ok(());
    }

    let file = args
        .file
        .context("an input file is required unless --rebuild-cache is given")?;
    info!(file = %file.display(), dry_run = args.dry_run, "Starting ingestion");

    let report = service.ingest_file(&ctx, &file).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
