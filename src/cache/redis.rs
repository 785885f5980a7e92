use std::{fmt, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};

use crate::application::repos::{CacheError, CacheStore};

const SOURCE: &str = "cache::redis";

/// Redis-backed cache shared between processes.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| CacheError::backend(format!("invalid redis url: {err}")))?;

        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|err| CacheError::backend(format!("failed to connect to redis: {err}")))?;

        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|err| CacheError::backend(format!("redis PING failed: {err}")))?;

        info!(target = SOURCE, "connected to redis cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|err| CacheError::backend(format!("redis GET failed: {err}")))?;
        debug!(target = SOURCE, key, hit = value.is_some(), "cache GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        // SETEX rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|err| CacheError::backend(format!("redis SETEX failed: {err}")))?;
        debug!(target = SOURCE, key, ttl_seconds = seconds, "cache SET");
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys.to_vec())
            .await
            .map_err(|err| CacheError::backend(format!("redis DEL failed: {err}")))?;
        debug!(target = SOURCE, count = keys.len(), "cache DEL");
        Ok(())
    }
}
