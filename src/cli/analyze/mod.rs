//! Analyze command - classifies one prompt from the terminal

use std::time::Duration;

use tracing::info;

use crate::api::types::AnalyzeResponse;
use crate::domain::security::PromptAnalyzer;
use crate::domain::RequestContext;

/// Print the verdict for `prompt` as pretty JSON
pub async fn run(config_dir: &str, prompt: &str, deadline_ms: Option<u64>) -> anyhow::Result<()> {
    let config = super::bootstrap(config_dir)?;
    let components = crate::build_components(&config).await?;

    let base = match deadline_ms {
        Some(ms) => RequestContext::with_timeout(Duration::from_millis(ms)),
        None => RequestContext::background(),
    };
    let (ctx, handle) = base.cancellable();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let analyzer = &components.analyzer;
    let result = analyzer.analyze(&ctx, prompt).await?;
    let threshold = analyzer.block_threshold();

    info!(
        malicious = result.is_malicious(),
        attack_type = result.attack_type(),
        "Analysis complete"
    );

    let response = AnalyzeResponse {
        blocked: result.should_block(threshold),
        mode: analyzer.mode(),
        threshold,
        result,
    };

    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
