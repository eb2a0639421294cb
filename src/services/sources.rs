//! Collaborator interfaces consumed by the recommendation core
//!
//! Persistence lives behind these traits; the core never talks to a database
//! or cache client directly. Implementations surface their own failures as
//! errors rather than returning empty data.

use std::collections::{HashMap, HashSet};

use crate::{
    error::AppResult,
    models::{CategoryId, Interaction, InteractionType, Product, ProductId, UserId},
};

/// Read access to recorded user interactions
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait InteractionSource: Send + Sync {
    /// Full interaction history of one user, in any order
    async fn interactions_of(&self, user_id: UserId) -> AppResult<Vec<Interaction>>;

    /// Users that interacted with at least one of `product_ids`
    ///
    /// This is the inverted-index lookup used to shortlist candidate users
    /// for collaborative scoring.
    async fn users_interacted_with(&self, product_ids: &[ProductId]) -> AppResult<HashSet<UserId>>;

    /// Histories of several users at once
    ///
    /// Default implementation issues one `interactions_of` call per user.
    /// Stores that can answer in a single round trip should override it.
    async fn interactions_for_users(
        &self,
        user_ids: &[UserId],
    ) -> AppResult<HashMap<UserId, Vec<Interaction>>> {
        let mut histories = HashMap::with_capacity(user_ids.len());
        for &user_id in user_ids {
            histories.insert(user_id, self.interactions_of(user_id).await?);
        }
        Ok(histories)
    }
}

/// Read access to product metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    async fn product_by_id(&self, product_id: ProductId) -> AppResult<Option<Product>>;

    /// Products that still exist among `product_ids`; missing ids are absent
    /// from the returned map.
    async fn products_by_ids(
        &self,
        product_ids: &[ProductId],
    ) -> AppResult<HashMap<ProductId, Product>> {
        let mut products = HashMap::with_capacity(product_ids.len());
        for &product_id in product_ids {
            if let Some(product) = self.product_by_id(product_id).await? {
                products.insert(product_id, product);
            }
        }
        Ok(products)
    }

    async fn active_products_by_category(&self, category_id: CategoryId)
        -> AppResult<Vec<Product>>;

    /// Up to `limit` active products ordered by purchase count descending,
    /// then view count descending, then id ascending.
    async fn top_by_purchase_then_view(&self, limit: usize) -> AppResult<Vec<Product>>;
}

/// Registered-user lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: UserId) -> AppResult<bool>;
}

/// Write side used by best-effort interaction tracking
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait InteractionSink: Send + Sync {
    async fn record(
        &self,
        user_id: UserId,
        product_id: ProductId,
        interaction_type: InteractionType,
    ) -> AppResult<Interaction>;
}
