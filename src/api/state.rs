use std::sync::Arc;

use crate::db::InMemoryStore;
use crate::services::{EngineSettings, InteractionTracker, RecommendationCache, RecommendationEngine};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub tracker: InteractionTracker,
    /// Count used when a request does not specify one
    pub default_count: usize,
}

impl AppState {
    pub fn new(engine: RecommendationEngine, tracker: InteractionTracker, default_count: usize) -> Self {
        Self {
            engine: Arc::new(engine),
            tracker,
            default_count: default_count.max(1),
        }
    }

    /// State wired entirely to one in-memory store, with a local-only cache
    pub fn in_memory(store: InMemoryStore, settings: EngineSettings) -> Self {
        let store = Arc::new(store);
        let engine = RecommendationEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            RecommendationCache::new(),
            settings,
        );
        Self::new(engine, InteractionTracker::new(store), 10)
    }
}
