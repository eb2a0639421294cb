use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;
use crate::models::UserId;
use crate::services::{CachedRecommendations, SharedResultStore};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    UserRecommendations(UserId),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::UserRecommendations(user_id) => write!(f, "recs:user:{}", user_id),
        }
    }
}

/// Creates a Redis client for the shared result tier
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Queued mutation, applied by the writer task in send order
#[derive(Debug, PartialEq)]
enum CacheWriteMessage {
    Set { key: String, value: String, ttl: u64 },
    Delete { key: String },
}

/// Redis-backed tier of the recommendation cache
///
/// Reads go straight to Redis; writes are queued to a background task so a
/// slow Redis never delays a response.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
    ttl: u64,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Signals the writer task to flush queued writes and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates the tier and spawns its background writer
    pub fn new(redis_client: Client, ttl: u64) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self::with_writer(redis_client, write_tx, ttl);
        (cache, CacheWriterHandle { shutdown_tx })
    }

    fn with_writer(
        redis_client: Client,
        write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
        ttl: u64,
    ) -> Self {
        Self {
            redis_client,
            write_tx,
            ttl,
        }
    }

    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write recommendations to Redis");
                    }
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    let mut flushed = 0usize;
                    while let Some(msg) = write_rx.recv().await {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                        } else {
                            flushed += 1;
                        }
                    }

                    tracing::info!(flushed, "Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        match msg {
            CacheWriteMessage::Set { key, value, ttl } => {
                let _: () = conn.set_ex(key, value, ttl).await?;
            }
            CacheWriteMessage::Delete { key } => {
                let _: () = conn.del(key).await?;
            }
        }
        Ok(())
    }

    /// Retrieves and deserializes a value, `None` when the key is absent
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        cached
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })
            })
            .transpose()
    }

    /// Queues a write without waiting for it
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        self.enqueue(CacheWriteMessage::Set {
            key: key.to_string(),
            value: json,
            ttl: self.ttl,
        });
    }

    /// Queues a delete behind every write already queued
    pub fn delete_in_background(&self, key: &CacheKey) {
        self.enqueue(CacheWriteMessage::Delete {
            key: key.to_string(),
        });
    }

    fn enqueue(&self, msg: CacheWriteMessage) {
        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }
}

#[async_trait::async_trait]
impl SharedResultStore for Cache {
    async fn load(&self, user_id: UserId) -> AppResult<Option<CachedRecommendations>> {
        self.get_from_cache(&CacheKey::UserRecommendations(user_id))
            .await
    }

    fn store(&self, user_id: UserId, entry: &CachedRecommendations) {
        self.set_in_background(&CacheKey::UserRecommendations(user_id), entry);
    }

    fn evict(&self, user_id: UserId) {
        self.delete_in_background(&CacheKey::UserRecommendations(user_id));
    }
}
