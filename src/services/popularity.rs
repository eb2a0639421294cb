use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::{
    error::AppResult,
    models::{Product, Recommendation, RecommendationSource},
    services::sources::CatalogSource,
};

const PURCHASE_WEIGHT: f64 = 10.0;
const VIEW_WEIGHT: f64 = 0.1;

/// `purchases × 10 + views × 0.1`
pub fn popularity_score(product: &Product) -> f64 {
    product.purchase_count as f64 * PURCHASE_WEIGHT + product.view_count as f64 * VIEW_WEIGHT
}

/// Score descending, then product id ascending
pub fn rank_order(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.product_id.cmp(&b.product_id))
}

/// Non-personalized ranking used for cold start and shortfall backfill
#[derive(Clone)]
pub struct PopularityRanker {
    catalog: Arc<dyn CatalogSource>,
}

impl PopularityRanker {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self { catalog }
    }

    /// Up to `count` active products tagged `Popular`
    ///
    /// Candidates are the catalog's top `count` by purchases then views,
    /// re-ranked by [`popularity_score`] with [`rank_order`] as tie-break.
    /// Returns fewer items when the catalog has fewer active products.
    pub async fn top_popular(&self, count: usize) -> AppResult<Vec<Recommendation>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let products = self.catalog.top_by_purchase_then_view(count).await?;

        let mut ranked: Vec<Recommendation> = products
            .iter()
            .filter(|p| p.active)
            .map(|p| {
                Recommendation::from_product(p, popularity_score(p), RecommendationSource::Popular)
            })
            .collect();
        ranked.sort_by(rank_order);
        ranked.truncate(count);

        debug!(requested = count, returned = ranked.len(), "Popular products ranked");

        Ok(ranked)
    }
}
