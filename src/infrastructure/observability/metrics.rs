//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

use super::config::MetricsConfig;

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish()
    }
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("prompt_sentinel_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// How an analysis ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Malicious,
    Safe,
    Error,
}

impl AnalysisOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malicious => "malicious",
            Self::Safe => "safe",
            Self::Error => "error",
        }
    }
}

/// Tier that produced the classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    Cache,
    Store,
    None,
}

impl AnalysisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Store => "store",
            Self::None => "none",
        }
    }
}

/// Record a finished analysis
pub fn record_analysis(outcome: AnalysisOutcome, source: AnalysisSource, duration: Duration) {
    let labels = [
        ("outcome", outcome.as_str().to_string()),
        ("source", source.as_str().to_string()),
    ];

    counter!("prompt_security_analyses_total", &labels).increment(1);
    histogram!("prompt_security_analysis_duration_seconds").record(duration.as_secs_f64());
}

/// Record an absorbed cache failure (`lookup` or `write_back`)
pub fn record_cache_failure(operation: &'static str) {
    counter!("prompt_security_cache_failures_total", "operation" => operation).increment(1);
}

/// Record a request rejected by the security gate
pub fn record_blocked_request(attack_type: &str) {
    counter!(
        "prompt_security_blocked_requests_total",
        "attack_type" => attack_type.to_string()
    )
    .increment(1);
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Sanitize URL path for metric labels (remove IDs, limit cardinality)
fn sanitize_path(path: &str) -> String {
    let path = UUID_SEGMENT.replace_all(path, "{id}");
    let path = NUMERIC_SEGMENT.replace_all(&path, "/{id}$1");

    path.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_uuid() {
        let path = "/v1/vectors/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(sanitize_path(path), "/v1/vectors/{id}");
    }

    #[test]
    fn test_sanitize_path_numeric_id() {
        assert_eq!(sanitize_path("/v1/vectors/123/similar"), "/v1/vectors/{id}/similar");
    }

    #[test]
    fn test_sanitize_path_no_id() {
        assert_eq!(sanitize_path("/v1/analyze"), "/v1/analyze");
    }

    #[test]
    fn test_sanitize_path_truncates_long_paths() {
        let path = "/very/long/path/that/exceeds/the/maximum/allowed/length/for/metrics";
        assert!(sanitize_path(path).len() <= 50);
    }

    #[test]
    fn test_label_names() {
        assert_eq!(AnalysisOutcome::Malicious.as_str(), "malicious");
        assert_eq!(AnalysisSource::Cache.as_str(), "cache");
        assert_eq!(AnalysisSource::None.as_str(), "none");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_analysis(AnalysisOutcome::Safe, AnalysisSource::None, Duration::from_millis(3));
        record_cache_failure("lookup");
        record_blocked_request("prompt_injection");
        record_http_request("POST", "/v1/analyze", 200, Duration::from_millis(3));
    }
}
