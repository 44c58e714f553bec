//! Prompt security gate for completion endpoints

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::{info, warn};

use super::truncate_for_log;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::security::SecurityMode;
use crate::domain::RequestContext;
use crate::infrastructure::observability::record_blocked_request;

/// Maximum request body size read by the gate (10 MB)
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Prompt text of a completion request: `prompt`, then `input`, then the
/// content of the last entry in `messages`.
pub fn extract_prompt(body: &Value) -> Option<String> {
    let text = |value: &Value| match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(_) => item.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("\n"))
        }
        _ => None,
    };

    body.get("prompt")
        .and_then(text)
        .or_else(|| body.get("input").and_then(text))
        .or_else(|| {
            body.get("messages")
                .and_then(Value::as_array)
                .and_then(|messages| messages.last())
                .and_then(|message| message.get("content"))
                .and_then(text)
        })
        .filter(|prompt| !prompt.trim().is_empty())
}

/// Analyze the request prompt before it reaches the handler.
///
/// In block mode a prompt classified malicious at or above the block
/// threshold is rejected with 403. Log mode only records the detection.
/// Analysis failures let the request through. A body that cannot be read
/// (over [`MAX_BODY_SIZE`] or a broken stream) is rejected with 400, since
/// it is consumed and cannot be forwarded.
pub async fn security_gate(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let analyzer = &state.analyzer;
    if !analyzer.is_enabled() {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_SIZE).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ApiError::bad_request(format!("Failed to read request body: {}", e))
                .into_response();
        }
    };

    let prompt = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .as_ref()
        .and_then(extract_prompt);
    let request = Request::from_parts(parts, Body::from(bytes));

    let Some(prompt) = prompt else {
        return next.run(request).await;
    };

    let result = match analyzer.analyze(&RequestContext::background(), &prompt).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, stage = %e.stage(), "Security analysis failed, allowing request");
            return next.run(request).await;
        }
    };

    if !result.is_malicious() {
        return next.run(request).await;
    }

    let threshold = analyzer.block_threshold();
    let should_block = result.should_block(threshold);

    match analyzer.mode() {
        SecurityMode::Block if should_block => {
            warn!(
                attack_type = result.attack_type(),
                confidence = result.confidence(),
                threshold,
                prompt = %truncate_for_log(&prompt, 80),
                "Blocked malicious prompt"
            );
            record_blocked_request(result.attack_type());

            ApiError::forbidden(format!(
                "Request blocked: prompt classified as {}",
                result.attack_type()
            ))
            .with_code("prompt_blocked")
            .into_response()
        }
        mode => {
            info!(
                attack_type = result.attack_type(),
                confidence = result.confidence(),
                threshold,
                mode = ?mode,
                "Malicious prompt detected, request allowed"
            );
            next.run(request).await
        }
    }
}
