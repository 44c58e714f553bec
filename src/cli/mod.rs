//! CLI module for Prompt Sentinel
//!
//! Provides subcommands:
//! - `serve`: HTTP API with the security gate
//! - `analyze`: classify a single prompt and print the verdict
//! - `ingest`: load a labelled JSON Lines or CSV corpus into the vector store

pub mod analyze;
pub mod ingest;
pub mod serve;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Prompt Sentinel - vector similarity security analysis for LLM prompts
#[derive(Parser)]
#[command(name = "prompt-sentinel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding default.toml and local.toml
    #[arg(long, global = true, default_value = "config")]
    pub config_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Analyze one prompt and print the result as JSON
    Analyze {
        /// Prompt text to classify
        prompt: String,

        /// Caller deadline in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },

    /// Ingest a JSON Lines or CSV file of labelled prompts
    Ingest(ingest::IngestArgs),
}

/// Load `.env`, the layered configuration and the log subscriber
pub(crate) fn bootstrap(config_dir: &str) -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load_from(config_dir)
        .with_context(|| format!("Failed to load configuration from '{}'", config_dir))?;
    logging::init_logging(&config.logging);

    Ok(config)
}
