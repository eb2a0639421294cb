pub mod memory;
pub mod postgres;
pub mod redis;

pub use self::memory::InMemoryStore;
pub use self::postgres::{create_pool, run_migrations, PgStore};
pub use self::redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
