use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;

use crate::services::cache::{clamp_ttl, CacheError};

/// Out-of-process cache tier shared across instances.
///
/// Only string keys, string values and TTLs are assumed; nothing here depends
/// on a particular product's wire protocol.
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Reset the TTL of an existing key. Returns false if the key is gone.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Remove every key starting with `prefix`, returning how many were removed
    async fn clear_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}

/// Redis-backed shared tier.
///
/// Each call works on its own clone of the multiplexed `ConnectionManager`.
#[derive(Clone)]
pub struct RedisSharedCache {
    redis: ConnectionManager,
}

impl RedisSharedCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self { redis })
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    (clamp_ttl(ttl).as_millis() as u64).max(1)
}

#[async_trait]
impl SharedCache for RedisSharedCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        let _: () = redis::cmd("PSETEX")
            .arg(key)
            .arg(ttl_millis(ttl))
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.redis.clone();
        let updated: bool = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(updated)
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let pattern = format!("{}*", prefix);
        let mut conn = self.redis.clone();
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        // SCAN rather than KEYS so a large keyspace doesn't block the server
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!("Cleared {} shared cache keys matching {}", removed, pattern);
        Ok(removed)
    }
}
