use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::{
    error::AppResult,
    models::{CategoryId, Interaction, ProductId},
    services::{collaborative::ScoreMap, similarity, sources::CatalogSource},
};

/// Score added per interaction the user had in a product's category
pub const CATEGORY_WEIGHT: f64 = 0.5;

/// Category-affinity boosting for unseen products
#[derive(Clone)]
pub struct ContentBooster {
    catalog: Arc<dyn CatalogSource>,
}

impl ContentBooster {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self { catalog }
    }

    /// Interaction count per category of the interacted products
    ///
    /// Interactions whose product no longer exists are skipped.
    pub async fn category_preferences(
        &self,
        history: &[Interaction],
    ) -> AppResult<BTreeMap<CategoryId, u64>> {
        let mut product_ids: Vec<ProductId> = similarity::product_set(history).into_iter().collect();
        product_ids.sort_unstable();

        let products = self.catalog.products_by_ids(&product_ids).await?;

        let mut preferences = BTreeMap::new();
        for interaction in history {
            match products.get(&interaction.product_id) {
                Some(product) => *preferences.entry(product.category_id).or_insert(0) += 1,
                None => debug!(
                    product_id = interaction.product_id,
                    "Skipping interaction on missing product"
                ),
            }
        }
        Ok(preferences)
    }

    /// Adds `count × 0.5` to every active, unseen product of each preferred
    /// category. Existing scores are kept and summed with.
    pub async fn boost(&self, history: &[Interaction], scores: &mut ScoreMap) -> AppResult<()> {
        let seen: HashSet<ProductId> = similarity::product_set(history);
        let preferences = self.category_preferences(history).await?;

        let catalog = &self.catalog;
        let per_category = try_join_all(preferences.iter().map(|(&category_id, &count)| async move {
            let products = catalog.active_products_by_category(category_id).await?;
            AppResult::Ok((count, products))
        }))
        .await?;

        let mut boosted = 0usize;
        for (count, products) in per_category {
            let boost = count as f64 * CATEGORY_WEIGHT;
            for product in products {
                if !product.active || seen.contains(&product.id) {
                    continue;
                }
                *scores.entry(product.id).or_insert(0.0) += boost;
                boosted += 1;
            }
        }

        debug!(
            categories = preferences.len(),
            boosted, "Content-based boost applied"
        );

        Ok(())
    }
}
