//! Corpus and cache statistics endpoint

use axum::extract::State;

use crate::api::state::AppState;
use crate::api::types::{ApiError, CacheStatsView, Json, StatsResponse};

/// GET /v1/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let store = state.store.stats().await?;

    let cache = match &state.cache {
        Some(cache) => Some(CacheStatsView::from(cache.stats().await?)),
        None => None,
    };

    Ok(Json(StatsResponse {
        enabled: state.analyzer.is_enabled(),
        store_backend: state.store.backend_name(),
        store,
        cache_backend: state.cache.as_ref().map(|c| c.backend_name()),
        cache,
    }))
}
