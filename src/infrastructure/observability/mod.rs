//! Observability infrastructure - Metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    create_metrics_router, init_metrics, record_analysis, record_blocked_request,
    record_cache_failure, record_http_request, AnalysisOutcome, AnalysisSource,
    PrometheusMetrics,
};
