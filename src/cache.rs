//! Redis-backed storage for interest vectors and soft feed invalidation.
//!
//! Cache keys:
//! - `uiv:{user_id}` → serialized interest vector. One key per user keeps
//!   the at-most-one-valid-vector invariant.
//! - `feed:{user_id}:{page}` → feed pages owned by the feed service. This
//!   service never writes them; invalidation only shortens their TTL.
//!
//! Soft invalidation uses `EXPIRE key <ttl> LT`, which applies the new TTL
//! only when it is lower than the remaining one. Repeat invalidations can
//! only shorten an entry's life, never extend it, so the operation is
//! idempotent and safe under concurrent sweeps. In-flight readers keep
//! hitting the entry until it lapses, spreading recomputation over the
//! shortened window instead of a synchronized miss spike.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::InterestVector;
use crate::services::{FeedInvalidator, HealthMonitor, VectorStore};

/// Cache tuning.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL feed entries are shortened to on soft invalidation.
    pub soft_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            soft_ttl: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct AlgorithmCache {
    client: Arc<ConnectionManager>,
    config: CacheConfig,
    monitor: HealthMonitor,
}

impl AlgorithmCache {
    pub async fn new(redis_url: &str, config: CacheConfig, monitor: HealthMonitor) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Dependency(format!("failed to create Redis client: {}", e)))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Dependency(format!("failed to connect to Redis: {}", e)))?;

        Ok(Self {
            client: Arc::new(manager),
            config,
            monitor,
        })
    }

    fn vector_key(user_id: &str) -> String {
        format!("uiv:{}", user_id)
    }

    fn feed_pattern(user_id: &str) -> String {
        format!("feed:{}:*", user_id)
    }

    /// Connection health probe for the liveness endpoint.
    pub async fn ping(&self) -> Result<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis PING failed: {}", e);
                AppError::Dependency(format!("Redis health check failed: {}", e))
            })?;
        Ok(())
    }

    async fn read_vector(&self, user_id: &str) -> Result<Option<InterestVector>> {
        let key = Self::vector_key(user_id);
        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis GET failed for {}: {}", key, e);
                AppError::Dependency(format!("Redis error: {}", e))
            })?;

        match value {
            Some(json) => {
                let vector = serde_json::from_str::<InterestVector>(&json)?;
                debug!("Cache hit for {}", key);
                self.monitor.record_vector_cache_hit();
                Ok(Some(vector))
            }
            None => {
                debug!("Cache miss for {}", key);
                self.monitor.record_vector_cache_miss();
                Ok(None)
            }
        }
    }

    async fn write_vector(
        &self,
        user_id: &str,
        vector: &InterestVector,
        ttl: Duration,
    ) -> Result<()> {
        let key = Self::vector_key(user_id);
        let json = serde_json::to_string(vector)?;

        redis::cmd("SETEX")
            .arg(&key)
            .arg(ttl.as_secs())
            .arg(&json)
            .query_async::<_, ()>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis SETEX failed for {}: {}", key, e);
                AppError::Dependency(format!("Redis error: {}", e))
            })?;

        debug!("Cached vector for {} with TTL={}s", user_id, ttl.as_secs());
        Ok(())
    }

    /// Shorten the TTL of every cached feed page for the user.
    ///
    /// Uses SCAN rather than KEYS so Redis never blocks, and `EXPIRE .. LT`
    /// so an already-shorter TTL is left alone. Returns the number of
    /// entries touched; absent entries are not an error.
    pub async fn soft_invalidate_feed(&self, user_id: &str) -> Result<usize> {
        let pattern = Self::feed_pattern(user_id);
        let soft_ttl = self.config.soft_ttl.as_secs();
        let mut cursor: u64 = 0;
        let mut touched = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut self.client.as_ref().clone())
                .await
                .map_err(|e| {
                    warn!("Redis SCAN failed for {}: {}", pattern, e);
                    AppError::Dependency(format!("Redis error: {}", e))
                })?;

            for key in &keys {
                let applied: i64 = redis::cmd("EXPIRE")
                    .arg(key)
                    .arg(soft_ttl)
                    .arg("LT")
                    .query_async(&mut self.client.as_ref().clone())
                    .await
                    .map_err(|e| {
                        warn!("Redis EXPIRE failed for {}: {}", key, e);
                        AppError::Dependency(format!("Redis error: {}", e))
                    })?;
                if applied == 1 {
                    touched += 1;
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        if touched > 0 {
            debug!(
                "Soft-invalidated {} feed entries for user {} (TTL -> {}s)",
                touched, user_id, soft_ttl
            );
        }

        Ok(touched)
    }
}

#[async_trait]
impl VectorStore for AlgorithmCache {
    async fn get_vector(&self, user_id: &str) -> Result<Option<InterestVector>> {
        self.read_vector(user_id).await
    }

    async fn put_vector_with_ttl(
        &self,
        user_id: &str,
        vector: &InterestVector,
        ttl: Duration,
    ) -> Result<()> {
        self.write_vector(user_id, vector, ttl).await
    }
}

#[async_trait]
impl FeedInvalidator for AlgorithmCache {
    async fn invalidate_user_feed(&self, user_id: &str) -> Result<()> {
        self.soft_invalidate_feed(user_id).await.map(|_| ())
    }
}
