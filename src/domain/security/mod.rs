//! Prompt security analysis domain

mod analyzer;
mod config;
mod error;
mod result;
mod scope;
pub(crate) mod serde_millis;

pub use analyzer::PromptAnalyzer;
pub use config::{EmbeddingSettings, SecurityMode, VectorSecurityConfig, DEFAULT_BLOCK_THRESHOLD};
pub use error::{AnalysisStage, SecurityError};
pub use result::{SecurityResult, SAFE_ATTACK_TYPE, UNKNOWN_ATTACK_TYPE};
pub use scope::{AnalysisScope, Interruption, DEFAULT_MODEL_TIMEOUT, DETACH_THRESHOLD};

#[cfg(test)]
pub use analyzer::mock::MockPromptAnalyzer;
