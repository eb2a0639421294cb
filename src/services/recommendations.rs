use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    error::{AppError, AppResult},
    models::{Interaction, ProductId, Recommendation, RecommendationSource, UserId},
    services::{
        cache::RecommendationCache,
        collaborative::{CollaborativeScorer, ScoreMap},
        content::ContentBooster,
        popularity::PopularityRanker,
        sources::{CatalogSource, InteractionSource, UserDirectory},
    },
};

/// Smallest window of ranked candidates resolved against the catalog at once
const MIN_RESOLVE_WINDOW: usize = 32;

/// Tunables of the recommendation engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Concurrent batches in the collaborative fan-out
    pub fanout_concurrency: usize,
    /// Deadline for one personalized computation
    pub compute_timeout: Duration,
    /// Cache popularity lists served to users without history
    pub cache_cold_start: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fanout_concurrency: 16,
            compute_timeout: Duration::from_secs(5),
            cache_cold_start: false,
        }
    }
}

/// Rejects a zero count
pub fn validate_count(count: usize) -> AppResult<()> {
    if count == 0 {
        return Err(AppError::InvalidInput(
            "count must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Blends collaborative, content-based and popularity signals into a
/// per-user product list
///
/// Flow for a known user: cached list if one covers the requested count;
/// otherwise popularity only when the user has no history, or collaborative
/// scores plus category boost, ranked, then topped up with popular products
/// the list does not already contain.
#[derive(Clone)]
pub struct RecommendationEngine {
    interactions: Arc<dyn InteractionSource>,
    catalog: Arc<dyn CatalogSource>,
    users: Arc<dyn UserDirectory>,
    collaborative: CollaborativeScorer,
    content: ContentBooster,
    popularity: PopularityRanker,
    cache: RecommendationCache,
    settings: EngineSettings,
}

impl RecommendationEngine {
    pub fn new(
        interactions: Arc<dyn InteractionSource>,
        catalog: Arc<dyn CatalogSource>,
        users: Arc<dyn UserDirectory>,
        cache: RecommendationCache,
        settings: EngineSettings,
    ) -> Self {
        Self {
            collaborative: CollaborativeScorer::new(
                interactions.clone(),
                settings.fanout_concurrency,
            ),
            content: ContentBooster::new(catalog.clone()),
            popularity: PopularityRanker::new(catalog.clone()),
            interactions,
            catalog,
            users,
            cache,
            settings,
        }
    }

    pub fn cache(&self) -> &RecommendationCache {
        &self.cache
    }

    pub fn popularity(&self) -> &PopularityRanker {
        &self.popularity
    }

    /// Personalized recommendations for a registered user
    pub async fn get_recommendations(
        &self,
        user_id: UserId,
        count: usize,
    ) -> AppResult<Vec<Recommendation>> {
        self.get_recommendations_until(user_id, count, &CancellationToken::new())
            .await
    }

    /// Like [`get_recommendations`](Self::get_recommendations), abandoning
    /// the computation when `cancel` fires
    ///
    /// A cancelled or timed-out computation returns [`AppError::Cancelled`]
    /// and leaves nothing in the cache.
    #[instrument(skip(self, cancel))]
    pub async fn get_recommendations_until(
        &self,
        user_id: UserId,
        count: usize,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<Recommendation>> {
        validate_count(count)?;

        if !self.users.exists(user_id).await? {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        if let Some(cached) = self.cache.get(user_id, count).await {
            return Ok(cached);
        }

        let history = self.interactions.interactions_of(user_id).await?;

        if history.is_empty() {
            info!(user_id, "No interaction history, serving popular products");
            if self.settings.cache_cold_start {
                return self
                    .cache
                    .get_or_compute(user_id, count, || self.popularity.top_popular(count))
                    .await;
            }
            return self.popularity.top_popular(count).await;
        }

        let recommendations = self
            .cache
            .get_or_compute(user_id, count, || {
                self.personalize_until(user_id, count, &history, cancel)
            })
            .await?;

        info!(
            user_id,
            count,
            returned = recommendations.len(),
            "Recommendations generated"
        );

        Ok(recommendations)
    }

    /// Popularity list for visitors without an account; never cached
    #[instrument(skip(self))]
    pub async fn get_guest_recommendations(&self, count: usize) -> AppResult<Vec<Recommendation>> {
        validate_count(count)?;
        self.popularity.top_popular(count).await
    }

    async fn personalize_until(
        &self,
        user_id: UserId,
        count: usize,
        history: &[Interaction],
        cancel: &CancellationToken,
    ) -> AppResult<Vec<Recommendation>> {
        let deadline = self.settings.compute_timeout;
        let work = tokio::time::timeout(deadline, self.personalize(user_id, count, history));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(user_id, "Personalization cancelled, discarding partial scores");
                Err(AppError::Cancelled(format!("recommendations for user {} cancelled", user_id)))
            }
            outcome = work => outcome.map_err(|_| {
                AppError::Cancelled(format!(
                    "recommendations for user {} exceeded {:?}",
                    user_id, deadline
                ))
            })?,
        }
    }

    async fn personalize(
        &self,
        user_id: UserId,
        count: usize,
        history: &[Interaction],
    ) -> AppResult<Vec<Recommendation>> {
        let mut scores = self.collaborative.score(user_id, history).await?;
        self.content.boost(history, &mut scores).await?;

        debug!(user_id, candidates = scores.len(), "Candidate scores combined");

        let personalized = self.rank_candidates(scores, count).await?;
        self.backfill(personalized, count).await
    }

    /// Top `count` candidates that resolve to an active product
    ///
    /// Candidates whose product has disappeared are skipped.
    async fn rank_candidates(
        &self,
        scores: ScoreMap,
        count: usize,
    ) -> AppResult<Vec<Recommendation>> {
        let mut ranked: Vec<(ProductId, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut recommendations = Vec::with_capacity(count.min(ranked.len()));
        for window in ranked.chunks(count.max(MIN_RESOLVE_WINDOW)) {
            let ids: Vec<ProductId> = window.iter().map(|(id, _)| *id).collect();
            let products = self.catalog.products_by_ids(&ids).await?;

            for (product_id, score) in window {
                match products.get(product_id) {
                    Some(product) if product.active => recommendations.push(
                        Recommendation::from_product(
                            product,
                            *score,
                            RecommendationSource::Collaborative,
                        ),
                    ),
                    _ => debug!(product_id, "Dropping candidate without an active product"),
                }
                if recommendations.len() == count {
                    return Ok(recommendations);
                }
            }
        }

        Ok(recommendations)
    }

    /// Tops `recommendations` up to `count` with popular products not
    /// already in the list
    async fn backfill(
        &self,
        mut recommendations: Vec<Recommendation>,
        count: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if recommendations.len() >= count {
            return Ok(recommendations);
        }

        let remaining = count - recommendations.len();
        let present: HashSet<ProductId> = recommendations.iter().map(|r| r.product_id).collect();

        let popular = self.popularity.top_popular(remaining + present.len()).await?;
        let before = recommendations.len();
        recommendations.extend(
            popular
                .into_iter()
                .filter(|r| !present.contains(&r.product_id))
                .take(remaining),
        );

        debug!(
            personalized = before,
            backfilled = recommendations.len() - before,
            "Shortfall backfilled with popular products"
        );

        Ok(recommendations)
    }
}
