//! Cache layer
//!
//! Key-value store for serialized records, keyed `"<record-kind>-<id>"`:
//! - In-memory cache (moka), the default
//! - Redis, behind the `redis-cache` feature, for multi-instance deployments
//!
//! ```rust,ignore
//! let cache = create_cache(&config.cache).await?;
//! cache.set("post-1", &post, config.cache.ttl()).await?;
//! ```

pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CacheDriver};

/// Cache operations.
///
/// The generic methods make this trait unusable as `dyn CacheLayer`; the
/// [`Cache`] enum provides runtime selection instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Store a value. `None` keeps it until invalidated.
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

pub use memory::MemoryCache;
#[cfg(feature = "redis-cache")]
pub use redis::RedisCache;

/// Configured cache backend
#[derive(Debug)]
pub enum Cache {
    Memory(MemoryCache),
    #[cfg(feature = "redis-cache")]
    Redis(RedisCache),
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete(key).await,
        }
    }
}

/// Cache key of a post
pub fn post_key(id: i64) -> String {
    format!("post-{}", id)
}

/// Create the cache selected by configuration.
///
/// Fails when Redis is configured without a URL, when the binary was built
/// without the `redis-cache` feature, or when the connection fails.
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    match config.driver {
        CacheDriver::Memory => {
            tracing::info!(
                max_capacity = config.max_capacity,
                ttl_seconds = ?config.ttl_seconds,
                "Using in-memory cache"
            );
            Ok(Arc::new(Cache::Memory(MemoryCache::with_capacity(
                config.max_capacity,
            ))))
        }
        CacheDriver::Redis => {
            #[cfg(feature = "redis-cache")]
            {
                let url = config
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("Redis URL is required for the redis cache driver"))?;
                tracing::info!(ttl_seconds = ?config.ttl_seconds, "Using Redis cache");
                Ok(Arc::new(Cache::Redis(RedisCache::new(url).await?)))
            }
            #[cfg(not(feature = "redis-cache"))]
            {
                anyhow::bail!(
                    "Redis cache driver is configured but the 'redis-cache' feature is not enabled"
                )
            }
        }
    }
}
