//! HTTP request and response types

pub mod analyze;
pub mod error;
pub mod json;

pub use analyze::{AnalyzeRequest, AnalyzeResponse, CacheStatsView, StatsResponse};
pub use error::{ApiError, ApiErrorDetail, ApiErrorResponse, ApiErrorType};
pub use json::Json;
