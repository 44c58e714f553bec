//! API middleware components

pub mod logging;
pub mod metrics;
pub mod security_gate;

pub use logging::{logging_middleware, truncate_for_log};
pub use metrics::metrics_middleware;
pub use security_gate::{extract_prompt, security_gate};
