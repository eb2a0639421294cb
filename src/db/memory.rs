use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{CategoryId, Interaction, InteractionType, Product, ProductId, UserId},
    services::sources::{CatalogSource, InteractionSink, InteractionSource, UserDirectory},
};

#[derive(Default)]
struct StoreInner {
    users: BTreeSet<UserId>,
    products: BTreeMap<ProductId, Product>,
    interactions: HashMap<UserId, Vec<Interaction>>,
    /// product → users who interacted with it
    product_users: HashMap<ProductId, HashSet<UserId>>,
}

/// Process-local store implementing every collaborator trait
///
/// Keeps the product → users index current on each insert, so collaborative
/// shortlists never require a scan.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: UserId) {
        self.inner.write().await.users.insert(user_id);
    }

    pub async fn upsert_product(&self, product: Product) {
        self.inner.write().await.products.insert(product.id, product);
    }

    /// Deletes a product; interactions referencing it are kept
    pub async fn remove_product(&self, product_id: ProductId) {
        self.inner.write().await.products.remove(&product_id);
    }

    pub async fn set_active(&self, product_id: ProductId, active: bool) {
        if let Some(product) = self.inner.write().await.products.get_mut(&product_id) {
            product.active = active;
        }
    }

    /// Appends an interaction without validating the referenced user or product
    pub async fn add_interaction(&self, interaction: Interaction) {
        let mut inner = self.inner.write().await;
        inner
            .product_users
            .entry(interaction.product_id)
            .or_default()
            .insert(interaction.user_id);
        inner
            .interactions
            .entry(interaction.user_id)
            .or_default()
            .push(interaction);
    }
}

#[async_trait::async_trait]
impl InteractionSource for InMemoryStore {
    async fn interactions_of(&self, user_id: UserId) -> AppResult<Vec<Interaction>> {
        let inner = self.inner.read().await;
        Ok(inner.interactions.get(&user_id).cloned().unwrap_or_default())
    }

    async fn users_interacted_with(&self, product_ids: &[ProductId]) -> AppResult<HashSet<UserId>> {
        let inner = self.inner.read().await;
        Ok(product_ids
            .iter()
            .filter_map(|p| inner.product_users.get(p))
            .flatten()
            .copied()
            .collect())
    }

    async fn interactions_for_users(
        &self,
        user_ids: &[UserId],
    ) -> AppResult<HashMap<UserId, Vec<Interaction>>> {
        let inner = self.inner.read().await;
        Ok(user_ids
            .iter()
            .map(|id| (*id, inner.interactions.get(id).cloned().unwrap_or_default()))
            .collect())
    }
}

#[async_trait::async_trait]
impl CatalogSource for InMemoryStore {
    async fn product_by_id(&self, product_id: ProductId) -> AppResult<Option<Product>> {
        Ok(self.inner.read().await.products.get(&product_id).cloned())
    }

    async fn products_by_ids(
        &self,
        product_ids: &[ProductId],
    ) -> AppResult<HashMap<ProductId, Product>> {
        let inner = self.inner.read().await;
        Ok(product_ids
            .iter()
            .filter_map(|id| inner.products.get(id).map(|p| (*id, p.clone())))
            .collect())
    }

    async fn active_products_by_category(
        &self,
        category_id: CategoryId,
    ) -> AppResult<Vec<Product>> {
        let inner = self.inner.read().await;
        Ok(inner
            .products
            .values()
            .filter(|p| p.active && p.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn top_by_purchase_then_view(&self, limit: usize) -> AppResult<Vec<Product>> {
        let inner = self.inner.read().await;
        let mut products: Vec<Product> =
            inner.products.values().filter(|p| p.active).cloned().collect();
        products.sort_by(|a, b| {
            b.purchase_count
                .cmp(&a.purchase_count)
                .then_with(|| b.view_count.cmp(&a.view_count))
                .then_with(|| a.id.cmp(&b.id))
        });
        products.truncate(limit);
        Ok(products)
    }
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryStore {
    async fn exists(&self, user_id: UserId) -> AppResult<bool> {
        Ok(self.inner.read().await.users.contains(&user_id))
    }
}

#[async_trait::async_trait]
impl InteractionSink for InMemoryStore {
    async fn record(
        &self,
        user_id: UserId,
        product_id: ProductId,
        interaction_type: InteractionType,
    ) -> AppResult<Interaction> {
        {
            let inner = self.inner.read().await;
            if !inner.users.contains(&user_id) {
                return Err(AppError::NotFound(format!("User {} not found", user_id)));
            }
            if !inner.products.contains_key(&product_id) {
                return Err(AppError::NotFound(format!("Product {} not found", product_id)));
            }
        }

        let interaction = Interaction::new(user_id, product_id, interaction_type);
        self.add_interaction(interaction.clone()).await;
        Ok(interaction)
    }
}
