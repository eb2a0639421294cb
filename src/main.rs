use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use product_recs::{
    api::{create_router, AppState},
    config::Config,
    db::{create_pool, create_redis_client, run_migrations, Cache, PgStore},
    services::{InteractionTracker, RecommendationCache, RecommendationEngine},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("product_recs=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = create_pool(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if config.run_migrations {
        run_migrations(&pool).await.context("Failed to run migrations")?;
    }
    let store = Arc::new(PgStore::new(pool));

    // Redis tier is optional; without it the cache stays process-local
    let (cache, writer_handle) = match config.redis_url.as_deref() {
        Some(url) => {
            let client = create_redis_client(url).context("Failed to create Redis client")?;
            let (shared, handle) = Cache::new(client, config.cache_ttl_secs);
            tracing::info!("Shared recommendation cache enabled");
            (RecommendationCache::with_shared(Arc::new(shared)), Some(handle))
        }
        None => (RecommendationCache::new(), None),
    };

    let engine = RecommendationEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        cache,
        config.engine_settings(),
    );
    let state = AppState::new(engine, InteractionTracker::new(store), config.default_count);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = writer_handle {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
