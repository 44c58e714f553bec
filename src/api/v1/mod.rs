//! v1 API endpoints

pub mod analyze;
pub mod completions;
pub mod stats;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::middleware::security_gate;
use super::state::AppState;

/// Create v1 API router. Completion endpoints sit behind the security gate.
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    let gated = Router::new()
        .route("/chat/completions", post(completions::accept_completion))
        .route("/completions", post(completions::accept_completion))
        .route_layer(middleware::from_fn_with_state(state, security_gate));

    Router::new()
        .route("/analyze", post(analyze::analyze_prompt))
        .route("/stats", get(stats::get_stats))
        .merge(gated)
}
