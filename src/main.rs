use clap::Parser;
use prompt_sentinel::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run(&cli.config_dir).await,
        Command::Analyze {
            prompt,
            deadline_ms,
        } => cli::analyze::run(&cli.config_dir, &prompt, deadline_ms).await,
        Command::Ingest(args) => cli::ingest::run(&cli.config_dir, args).await,
    }
}
