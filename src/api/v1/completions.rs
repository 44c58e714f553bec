//! Completion endpoints that acknowledge requests admitted by the gate

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::types::Json;

/// POST /v1/chat/completions and /v1/completions
pub async fn accept_completion(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let model = body.get("model").cloned().unwrap_or(Value::Null);

    (
        StatusCode::OK,
        Json(json!({
            "id": format!("req-{}", Uuid::new_v4()),
            "object": "security.admission",
            "status": "accepted",
            "model": model,
        })),
    )
}
