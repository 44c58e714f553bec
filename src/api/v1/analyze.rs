//! Prompt analysis endpoint

use std::time::Duration;

use axum::extract::State;
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{AnalyzeRequest, AnalyzeResponse, ApiError, Json};
use crate::domain::RequestContext;

/// POST /v1/analyze
pub async fn analyze_prompt(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("Prompt cannot be empty").with_param("prompt"));
    }

    let ctx = match request.deadline_ms {
        Some(ms) => RequestContext::with_timeout(Duration::from_millis(ms)),
        None => RequestContext::background(),
    };

    let analyzer = &state.analyzer;
    let result = analyzer.analyze(&ctx, &request.prompt).await?;
    let threshold = analyzer.block_threshold();

    debug!(
        malicious = result.is_malicious(),
        attack_type = result.attack_type(),
        "Analyze request served"
    );

    Ok(Json(AnalyzeResponse {
        blocked: result.should_block(threshold),
        mode: analyzer.mode(),
        threshold,
        result,
    }))
}
