//! Vector similarity based prompt analyzer

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::embedding::{EmbeddingGenerator, PromptEmbedding};
use crate::domain::security::{
    AnalysisScope, AnalysisStage, Interruption, PromptAnalyzer, SecurityError, SecurityMode,
    SecurityResult, VectorSecurityConfig, DEFAULT_BLOCK_THRESHOLD,
};
use crate::domain::vector::{SimilarityMatch, VectorSearchParams, VectorStore};
use crate::domain::vector_cache::{CacheSearchParams, CachedVector, VectorCache};
use crate::domain::RequestContext;
use crate::infrastructure::observability::{
    record_analysis, record_cache_failure, AnalysisOutcome, AnalysisSource,
};

const DEFAULT_EMBEDDING_TYPE: &str = "pattern";

/// Result of the cache tier. Failures are absorbed and behave like a miss.
#[derive(Debug)]
enum CacheOutcome {
    Hit(CachedVector),
    Miss,
    Failed(String),
}

/// Result of storing a detection back into the cache
#[derive(Debug, PartialEq)]
enum WriteBackOutcome {
    Stored,
    Skipped,
    Failed(String),
}

/// Analyzer that embeds the prompt, consults the cache, and falls back to
/// the durable vector store.
///
/// Every collaborator call runs under one [`AnalysisScope`]. Only store
/// detections marked malicious are written back to the cache.
pub struct VectorSecurityAnalyzer {
    config: Option<VectorSecurityConfig>,
    embedder: Arc<dyn EmbeddingGenerator>,
    store: Arc<dyn VectorStore>,
    cache: Option<Arc<dyn VectorCache>>,
}

impl fmt::Debug for VectorSecurityAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorSecurityAnalyzer")
            .field("config", &self.config)
            .field("embedder", &self.embedder)
            .field("store", &self.store.backend_name())
            .field("cache", &self.cache.as_ref().map(|c| c.backend_name()))
            .finish()
    }
}

impl VectorSecurityAnalyzer {
    pub fn new(
        config: Option<VectorSecurityConfig>,
        embedder: Arc<dyn EmbeddingGenerator>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn VectorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> Option<&VectorSecurityConfig> {
        self.config.as_ref()
    }

    fn expected_embedding_type(&self) -> &str {
        self.config
            .as_ref()
            .map(|c| c.expected_embedding_type())
            .unwrap_or(DEFAULT_EMBEDDING_TYPE)
    }

    fn interrupted(scope: &AnalysisScope, stage: AnalysisStage, reason: Interruption) -> SecurityError {
        match reason {
            Interruption::DeadlineExceeded => SecurityError::Timeout {
                stage,
                budget: scope.window(),
            },
            Interruption::Cancelled => SecurityError::Cancelled { stage },
        }
    }

    async fn embed(
        &self,
        scope: &AnalysisScope,
        prompt: &str,
    ) -> Result<PromptEmbedding, SecurityError> {
        scope
            .guard(self.embedder.generate(scope.context(), prompt))
            .await
            .map_err(|reason| Self::interrupted(scope, AnalysisStage::Embedding, reason))?
            .map_err(SecurityError::Embedding)
    }

    async fn lookup_cache(
        &self,
        scope: &AnalysisScope,
        embedding: &[f32],
        threshold: f32,
    ) -> CacheOutcome {
        let Some(cache) = &self.cache else {
            return CacheOutcome::Miss;
        };

        let params = CacheSearchParams::new(threshold).with_max_results(1);

        match scope
            .guard(cache.search_similar(scope.context(), embedding, params))
            .await
        {
            Ok(Ok(lookup)) => match lookup.into_hit() {
                Some(cached) => CacheOutcome::Hit(cached),
                None => CacheOutcome::Miss,
            },
            Ok(Err(e)) => CacheOutcome::Failed(e.to_string()),
            Err(reason) => CacheOutcome::Failed(
                Self::interrupted(scope, AnalysisStage::CacheLookup, reason).to_string(),
            ),
        }
    }

    async fn search_store(
        &self,
        scope: &AnalysisScope,
        embedding: &[f32],
        threshold: f32,
    ) -> Result<Option<SimilarityMatch>, SecurityError> {
        let params = VectorSearchParams::new(threshold);

        let matches = scope
            .guard(self.store.find_similar(scope.context(), embedding, params))
            .await
            .map_err(|reason| Self::interrupted(scope, AnalysisStage::VectorSearch, reason))?
            .map_err(SecurityError::Store)?;

        Ok(matches.into_iter().max_by(|a, b| {
            a.similarity()
                .partial_cmp(&b.similarity())
                .unwrap_or(std::cmp::Ordering::Equal)
        }))
    }

    async fn write_back(
        &self,
        scope: &AnalysisScope,
        found: &SimilarityMatch,
        embedding: &[f32],
    ) -> WriteBackOutcome {
        let Some(cache) = &self.cache else {
            return WriteBackOutcome::Skipped;
        };

        if !found.vector().label().is_malicious() {
            return WriteBackOutcome::Skipped;
        }

        let record = CachedVector::from_match(found, embedding);

        match scope
            .guard(cache.store(scope.context(), embedding, record))
            .await
        {
            Ok(Ok(())) => WriteBackOutcome::Stored,
            Ok(Err(e)) => WriteBackOutcome::Failed(e.to_string()),
            Err(reason) => WriteBackOutcome::Failed(
                Self::interrupted(scope, AnalysisStage::CacheWriteBack, reason).to_string(),
            ),
        }
    }

    async fn classify(
        &self,
        scope: &AnalysisScope,
        prompt: &str,
    ) -> Result<(SecurityResult, AnalysisSource), SecurityError> {
        let threshold = self.block_threshold();
        let embedding = self.embed(scope, prompt).await?;

        match self.lookup_cache(scope, embedding.vector(), threshold).await {
            CacheOutcome::Hit(cached) => {
                debug!(
                    similarity = cached.similarity(),
                    attack_type = cached.label_text(),
                    "Prompt matched cached detection"
                );
                return Ok((SecurityResult::from_cached(&cached), AnalysisSource::Cache));
            }
            CacheOutcome::Failed(reason) => {
                warn!(stage = %AnalysisStage::CacheLookup, error = %reason, "Cache lookup failed, falling back to vector store");
                record_cache_failure("lookup");
            }
            CacheOutcome::Miss => {}
        }

        let Some(best) = self.search_store(scope, embedding.vector(), threshold).await? else {
            return Ok((SecurityResult::safe(), AnalysisSource::None));
        };

        let expected = self.expected_embedding_type();
        if let Some(found_type) = best.vector().embedding_type() {
            if !found_type.is_empty() && found_type != expected {
                warn!(
                    expected = expected,
                    found = found_type,
                    vector_id = best.vector().id(),
                    "Embedding type mismatch, discarding match"
                );
                return Ok((SecurityResult::safe(), AnalysisSource::None));
            }
        }

        let result = SecurityResult::from_match(&best);

        if result.is_malicious() {
            match self.write_back(scope, &best, embedding.vector()).await {
                WriteBackOutcome::Failed(reason) => {
                    warn!(stage = %AnalysisStage::CacheWriteBack, error = %reason, "Failed to cache detection");
                    record_cache_failure("write_back");
                }
                outcome => debug!(?outcome, "Cache write-back finished"),
            }
        }

        Ok((result, AnalysisSource::Store))
    }
}

#[async_trait]
impl PromptAnalyzer for VectorSecurityAnalyzer {
    async fn analyze(
        &self,
        ctx: &RequestContext,
        prompt: &str,
    ) -> Result<SecurityResult, SecurityError> {
        let started = Instant::now();
        let model_timeout = self.config.as_ref().and_then(|c| c.model_timeout());
        let scope = AnalysisScope::isolate(ctx, model_timeout);

        if scope.is_detached() {
            debug!(
                budget_ms = scope.budget().as_millis() as u64,
                "Caller deadline nearly expired, analysing with a fresh budget"
            );
        }

        let outcome = self.classify(&scope, prompt).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok((result, source)) => {
                let label = if result.is_malicious() {
                    AnalysisOutcome::Malicious
                } else {
                    AnalysisOutcome::Safe
                };
                record_analysis(label, source, elapsed);

                debug!(
                    malicious = result.is_malicious(),
                    confidence = result.confidence(),
                    attack_type = result.attack_type(),
                    source = source.as_str(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Prompt analysis completed"
                );

                Ok(result.with_processing_time(elapsed))
            }
            Err(e) => {
                record_analysis(AnalysisOutcome::Error, AnalysisSource::None, elapsed);
                warn!(stage = %e.stage(), error = %e, "Prompt analysis failed");
                Err(e)
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.enabled)
    }

    fn block_threshold(&self) -> f32 {
        self.config
            .as_ref()
            .map(|c| c.block_threshold)
            .unwrap_or(DEFAULT_BLOCK_THRESHOLD)
    }

    fn mode(&self) -> SecurityMode {
        self.config.as_ref().map(|c| c.mode).unwrap_or_default()
    }
}
