//! Per-user memoization of final recommendation lists
//!
//! Lifecycle: one `RecommendationCache` per engine instance, created at
//! startup and shared by every request. Entries are never refreshed when a
//! user records new interactions; `invalidate` is the hook for collaborators
//! that want fresher results, and nothing in this crate calls it on its own.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    error::AppResult,
    models::{Recommendation, UserId},
};

/// A cached list together with the count it was computed for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecommendations {
    pub requested: usize,
    pub items: Vec<Recommendation>,
}

impl CachedRecommendations {
    /// The cached prefix for `count`, if this entry was computed for at
    /// least that many items
    pub fn serve(&self, count: usize) -> Option<Vec<Recommendation>> {
        if count > self.requested {
            return None;
        }
        Some(self.items.iter().take(count).cloned().collect())
    }
}

/// Out-of-process tier shared between service instances
#[async_trait::async_trait]
pub trait SharedResultStore: Send + Sync {
    async fn load(&self, user_id: UserId) -> AppResult<Option<CachedRecommendations>>;

    /// Stores without waiting for the write to complete
    fn store(&self, user_id: UserId, entry: &CachedRecommendations);

    /// Removes without waiting; must be applied after any `store` for the
    /// same user issued before it
    fn evict(&self, user_id: UserId);
}

struct CacheInner {
    local: DashMap<UserId, CachedRecommendations>,
    flights: DashMap<UserId, Arc<Mutex<()>>>,
    shared: Option<Arc<dyn SharedResultStore>>,
}

/// Two-tier result cache with per-user single-flight computation
#[derive(Clone)]
pub struct RecommendationCache {
    inner: Arc<CacheInner>,
}

impl Default for RecommendationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationCache {
    /// Process-local cache only
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Local cache backed by a shared tier
    pub fn with_shared(shared: Arc<dyn SharedResultStore>) -> Self {
        Self::build(Some(shared))
    }

    fn build(shared: Option<Arc<dyn SharedResultStore>>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                local: DashMap::new(),
                flights: DashMap::new(),
                shared,
            }),
        }
    }

    /// Cached list for `user_id`, truncated to `count`
    ///
    /// Shared-tier failures are logged and treated as a miss.
    pub async fn get(&self, user_id: UserId, count: usize) -> Option<Vec<Recommendation>> {
        if let Some(entry) = self.inner.local.get(&user_id) {
            if let Some(items) = entry.serve(count) {
                debug!(user_id, "Local cache hit");
                return Some(items);
            }
        }

        let shared = self.inner.shared.as_ref()?;
        match shared.load(user_id).await {
            Ok(Some(entry)) => {
                let items = entry.serve(count)?;
                debug!(user_id, "Shared cache hit");
                self.inner.local.insert(user_id, entry);
                Some(items)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(user_id, error = %e, "Shared cache read failed, treating as miss");
                None
            }
        }
    }

    pub fn put(&self, user_id: UserId, requested: usize, items: &[Recommendation]) {
        let entry = CachedRecommendations {
            requested,
            items: items.to_vec(),
        };
        if let Some(shared) = &self.inner.shared {
            shared.store(user_id, &entry);
        }
        self.inner.local.insert(user_id, entry);
    }

    /// Drops the cached list of one user from both tiers
    pub fn invalidate(&self, user_id: UserId) {
        self.inner.local.remove(&user_id);
        if let Some(shared) = &self.inner.shared {
            shared.evict(user_id);
        }
        debug!(user_id, "Recommendations invalidated");
    }

    /// Drops every locally cached list
    pub fn clear(&self) {
        self.inner.local.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.local.is_empty()
    }

    /// Returns the cached list or computes, stores and returns a new one
    ///
    /// At most one computation per user runs at a time. Callers arriving
    /// while one is in flight wait for it and are then served from the
    /// cache. If the in-flight computation fails or is dropped, the next
    /// waiter computes on its own.
    pub async fn get_or_compute<F, Fut>(
        &self,
        user_id: UserId,
        count: usize,
        compute: F,
    ) -> AppResult<Vec<Recommendation>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Vec<Recommendation>>>,
    {
        if let Some(items) = self.get(user_id, count).await {
            return Ok(items);
        }

        let flight = self.inner.flights.entry(user_id).or_default().clone();
        let outcome = self.compute_in_flight(&flight, user_id, count, compute).await;

        drop(flight);
        self.inner
            .flights
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);

        outcome
    }

    async fn compute_in_flight<F, Fut>(
        &self,
        flight: &Mutex<()>,
        user_id: UserId,
        count: usize,
        compute: F,
    ) -> AppResult<Vec<Recommendation>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Vec<Recommendation>>>,
    {
        let _guard = flight.lock().await;

        if let Some(items) = self.get(user_id, count).await {
            debug!(user_id, "Served from computation finished while waiting");
            return Ok(items);
        }

        let items = compute().await?;
        self.put(user_id, count, &items);
        Ok(items)
    }
}
