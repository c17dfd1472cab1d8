//! Redis-backed [`KvStore`].
//!
//! One multiplexed [`ConnectionManager`] is shared by every caller; it
//! reconnects on its own after transient failures.

use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};

use crate::cache::{CacheError, KvStore};
use crate::config::RedisSettings;

use super::error::InfraError;

const RELEASE_IF_EQUALS: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str, settings: &RedisSettings) -> Result<Self, InfraError> {
        let config = manager_config(settings);
        let client = Client::open(url)
            .map_err(|err| InfraError::cache(format!("invalid redis url: {err}")))?;
        let conn = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(|err| InfraError::cache(format!("failed to connect to redis: {err}")))?;

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(CacheError::backend)
    }
}

fn manager_config(settings: &RedisSettings) -> ConnectionManagerConfig {
    ConnectionManagerConfig::new()
        .set_number_of_retries(settings.retries as usize)
        .set_connection_timeout(settings.connect_timeout)
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(CacheError::backend)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl))
            .await
            .map_err(CacheError::backend)
    }

    async fn delete(&self, key: &str) -> Result<usize, CacheError> {
        let mut conn = self.conn.clone();
        conn.del(key).await.map_err(CacheError::backend)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;
        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let removed: i64 = Script::new(RELEASE_IF_EQUALS)
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;
        Ok(removed > 0)
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, CacheError> {
        let mut conn = self.conn.clone();
        conn.lpush(key, value).await.map_err(CacheError::backend)
    }

    async fn list_push_many(&self, key: &str, values: &[String]) -> Result<usize, CacheError> {
        if values.is_empty() {
            return self.list_len(key).await;
        }
        let mut conn = self.conn.clone();
        conn.lpush(key, values).await.map_err(CacheError::backend)
    }

    async fn list_len(&self, key: &str) -> Result<usize, CacheError> {
        let mut conn = self.conn.clone();
        conn.llen(key).await.map_err(CacheError::backend)
    }

    async fn list_take_oldest(&self, key: &str, count: usize) -> Result<Vec<String>, CacheError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let count = isize::try_from(count).unwrap_or(isize::MAX);
        let mut conn = self.conn.clone();

        // LRANGE and LTRIM run inside MULTI so concurrent drains never see
        // the same records.
        let (taken, ()): (Vec<String>, ()) = redis::pipe()
            .atomic()
            .lrange(key, -count, -1)
            .ltrim(key, 0, -(count + 1))
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;
        Ok(taken)
    }

    async fn list_requeue(&self, key: &str, values: &[String]) -> Result<usize, CacheError> {
        if values.is_empty() {
            return self.list_len(key).await;
        }
        let mut conn = self.conn.clone();
        conn.rpush(key, values).await.map_err(CacheError::backend)
    }
}
