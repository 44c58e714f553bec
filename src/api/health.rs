//! Health check endpoints for Kubernetes probes

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::state::AppState;
use super::types::Json;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl HealthCheck {
    fn from_result<T, E: std::fmt::Display>(name: &str, started: Instant, result: Result<T, E>) -> Self {
        let (status, message) = match result {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (HealthStatus::Unhealthy, Some(e.to_string())),
        };

        Self {
            name: name.to_string(),
            status,
            message,
            latency_ms: Some(started.elapsed().as_millis() as u64),
        }
    }
}

/// Returns 200 while the process is running
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: None,
        latency_ms: None,
    };

    (StatusCode::OK, Json(response))
}

/// Readiness: the vector store must answer. An unreachable cache only
/// degrades, since analysis falls back to the store.
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();

    let store_started = Instant::now();
    let store_check = HealthCheck::from_result(
        &format!("vector_store:{}", state.store.backend_name()),
        store_started,
        state.store.stats().await,
    );

    let mut overall = if store_check.status == HealthStatus::Healthy {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };
    let mut checks = vec![store_check];

    if let Some(cache) = &state.cache {
        let cache_started = Instant::now();
        let cache_check = HealthCheck::from_result(
            &format!("vector_cache:{}", cache.backend_name()),
            cache_started,
            cache.stats().await,
        );

        if cache_check.status != HealthStatus::Healthy && overall == HealthStatus::Healthy {
            overall = HealthStatus::Degraded;
        }
        checks.push(cache_check);
    }

    let response = HealthResponse {
        status: overall,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: Some(checks),
        latency_ms: Some(start.elapsed().as_millis() as u64),
    };

    let status_code = match overall {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}
