//! Application state for shared services

use std::sync::Arc;

use crate::domain::security::PromptAnalyzer;
use crate::domain::vector::VectorStore;
use crate::domain::vector_cache::VectorCache;

/// Shared handles used by the HTTP layer
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<dyn PromptAnalyzer>,
    pub store: Arc<dyn VectorStore>,
    pub cache: Option<Arc<dyn VectorCache>>,
}

impl AppState {
    pub fn new(analyzer: Arc<dyn PromptAnalyzer>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            analyzer,
            store,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn VectorCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("analyzer", &self.analyzer)
            .field("store", &self.store.backend_name())
            .field("cache", &self.cache.as_ref().map(|c| c.backend_name()))
            .finish()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::security::MockPromptAnalyzer;
    use crate::infrastructure::vector_cache::InMemoryVectorCache;
    use crate::infrastructure::vector_store::InMemoryVectorStore;

    /// State around a hand mock analyzer with in-memory backends
    pub fn state_with(analyzer: MockPromptAnalyzer) -> (AppState, Arc<MockPromptAnalyzer>) {
        let analyzer = Arc::new(analyzer);
        let state = AppState::new(analyzer.clone(), Arc::new(InMemoryVectorStore::new()))
            .with_cache(Arc::new(InMemoryVectorCache::new()));
        (state, analyzer)
    }
}
