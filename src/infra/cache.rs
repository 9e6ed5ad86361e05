//! Redis cache implementation.
//!
//! Provides a type-safe layer over a multiplexed Redis connection. Values
//! are stored as JSON strings.

use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::{AppError, AppResult};

/// Redis cache wrapper with connection pooling.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
}

impl Cache {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        let client = Client::open(redis_url).map_err(cache_error)?;
        let connection = ConnectionManager::new(client).await.map_err(cache_error)?;

        tracing::info!("Redis cache connected");

        Ok(Self { connection })
    }

    /// Round-trip a PING.
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    // =========================================================================
    // Value Operations
    // =========================================================================

    /// Get a value from cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(cache_error)?;
        value.map(|json| decode(&json)).transpose()
    }

    /// Set a value with a TTL in seconds.
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, json, ttl_seconds)
            .await
            .map_err(cache_error)?;

        Ok(())
    }

    /// Atomically read and delete a value (GETDEL).
    ///
    /// Of several concurrent callers at most one sees `Some`.
    pub async fn take<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        value.map(|json| decode(&json)).transpose()
    }

    /// Delete keys, returning how many existed.
    pub async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection.clone();
        let deleted: u64 = conn.del(keys).await.map_err(cache_error)?;
        Ok(deleted)
    }

    /// Check if a key exists in cache.
    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(key).await.map_err(cache_error)?;
        Ok(exists)
    }

    /// Keys matching a glob pattern, walked with an incremental SCAN cursor
    /// so a large keyspace never blocks the server. SCAN may repeat a key,
    /// the result is deduplicated.
    pub async fn scan_keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        let mut conn = self.connection.clone();
        let mut iter: redis::AsyncIter<String> =
            conn.scan_match(pattern).await.map_err(cache_error)?;

        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    // =========================================================================
    // Set Operations
    // =========================================================================

    /// Add a member to a set and push the set's expiry out to `ttl_seconds`.
    pub async fn add_to_set(&self, key: &str, member: &str, ttl_seconds: u64) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::pipe()
            .atomic()
            .sadd(key, member)
            .ignore()
            .expire(key, ttl_seconds as i64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    pub async fn remove_from_set(&self, key: &str, members: &[String]) -> AppResult<()> {
        if members.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let _: u64 = conn.srem(key, members).await.map_err(cache_error)?;
        Ok(())
    }

    pub async fn set_members(&self, key: &str) -> AppResult<Vec<String>> {
        let mut conn = self.connection.clone();
        let members: Vec<String> = conn.smembers(key).await.map_err(cache_error)?;
        Ok(members)
    }
}

fn decode<T: DeserializeOwned>(json: &str) -> AppResult<T> {
    serde_json::from_str(json)
        .map_err(|e| AppError::internal(format!("Cache deserialization error: {}", e)))
}

/// Convert Redis error to AppError.
fn cache_error(e: RedisError) -> AppError {
    tracing::error!("Redis error: {}", e);
    AppError::Cache(e)
}
