use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::{
    error::AppResult,
    models::{CategoryId, Interaction, InteractionType, Product, ProductId, UserId},
    services::sources::{CatalogSource, InteractionSink, InteractionSource, UserDirectory},
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    category_id: i64,
    active: bool,
    purchase_count: Option<i64>,
    view_count: Option<i64>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            active: row.active,
            purchase_count: row.purchase_count.unwrap_or(0).max(0) as u64,
            view_count: row.view_count.unwrap_or(0).max(0) as u64,
        }
    }
}

#[derive(Debug, FromRow)]
struct InteractionRow {
    user_id: i64,
    product_id: i64,
    interaction_type: String,
    created_at: DateTime<Utc>,
}

impl From<InteractionRow> for Interaction {
    fn from(row: InteractionRow) -> Self {
        Interaction {
            user_id: row.user_id,
            product_id: row.product_id,
            interaction_type: row
                .interaction_type
                .parse()
                .unwrap_or(InteractionType::Unknown),
            created_at: row.created_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, name, category_id, active, purchase_count, view_count";
const INTERACTION_COLUMNS: &str = "user_id, product_id, interaction_type, created_at";

/// Postgres-backed implementation of the collaborator traits
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl InteractionSource for PgStore {
    async fn interactions_of(&self, user_id: UserId) -> AppResult<Vec<Interaction>> {
        let rows: Vec<InteractionRow> = sqlx::query_as(&format!(
            "SELECT {INTERACTION_COLUMNS} FROM user_interactions WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Interaction::from).collect())
    }

    async fn users_interacted_with(&self, product_ids: &[ProductId]) -> AppResult<HashSet<UserId>> {
        if product_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT user_id FROM user_interactions WHERE product_id = ANY($1)",
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn interactions_for_users(
        &self,
        user_ids: &[UserId],
    ) -> AppResult<HashMap<UserId, Vec<Interaction>>> {
        let mut histories: HashMap<UserId, Vec<Interaction>> =
            user_ids.iter().map(|id| (*id, Vec::new())).collect();
        if user_ids.is_empty() {
            return Ok(histories);
        }

        let rows: Vec<InteractionRow> = sqlx::query_as(&format!(
            "SELECT {INTERACTION_COLUMNS} FROM user_interactions WHERE user_id = ANY($1)"
        ))
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            histories
                .entry(row.user_id)
                .or_default()
                .push(Interaction::from(row));
        }

        Ok(histories)
    }
}

#[async_trait::async_trait]
impl CatalogSource for PgStore {
    async fn product_by_id(&self, product_id: ProductId) -> AppResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Product::from))
    }

    async fn products_by_ids(
        &self,
        product_ids: &[ProductId],
    ) -> AppResult<HashMap<ProductId, Product>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id, Product::from(row)))
            .collect())
    }

    async fn active_products_by_category(
        &self,
        category_id: CategoryId,
    ) -> AppResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE category_id = $1 AND active = TRUE"
        ))
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn top_by_purchase_then_view(&self, limit: usize) -> AppResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE active = TRUE \
             ORDER BY COALESCE(purchase_count, 0) DESC, COALESCE(view_count, 0) DESC, id ASC \
             LIMIT $1"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

#[async_trait::async_trait]
impl UserDirectory for PgStore {
    async fn exists(&self, user_id: UserId) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}

#[async_trait::async_trait]
impl InteractionSink for PgStore {
    async fn record(
        &self,
        user_id: UserId,
        product_id: ProductId,
        interaction_type: InteractionType,
    ) -> AppResult<Interaction> {
        let row: InteractionRow = sqlx::query_as(&format!(
            "INSERT INTO user_interactions (user_id, product_id, interaction_type) \
             VALUES ($1, $2, $3) RETURNING {INTERACTION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(product_id)
        .bind(interaction_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(Interaction::from(row))
    }
}
