//! Analysis endpoint types

use serde::{Deserialize, Serialize};

use crate::domain::security::{SecurityMode, SecurityResult};
use crate::domain::vector::VectorStoreStats;
use crate::domain::vector_cache::VectorCacheStats;

/// Body of `POST /v1/analyze`
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub prompt: String,
    /// Caller deadline in milliseconds
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub result: SecurityResult,
    /// Whether the gate would reject this prompt in block mode
    pub blocked: bool,
    pub mode: SecurityMode,
    pub threshold: f32,
}

/// Body of `GET /v1/stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub enabled: bool,
    pub store_backend: &'static str,
    pub store: VectorStoreStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_backend: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStatsView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsView {
    #[serde(flatten)]
    pub stats: VectorCacheStats,
    pub hit_rate: f64,
}

impl From<VectorCacheStats> for CacheStatsView {
    fn from(stats: VectorCacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}
