//! Prompt analyzer trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use super::{SecurityError, SecurityMode, SecurityResult};
use crate::domain::RequestContext;

/// Classifies prompts as malicious or safe
#[async_trait]
pub trait PromptAnalyzer: Send + Sync + Debug {
    async fn analyze(
        &self,
        ctx: &RequestContext,
        prompt: &str,
    ) -> Result<SecurityResult, SecurityError>;

    /// True iff configuration is present and enables analysis
    fn is_enabled(&self) -> bool;

    /// Configured block threshold, or the default when unconfigured
    fn block_threshold(&self) -> f32;

    fn mode(&self) -> SecurityMode;
}
