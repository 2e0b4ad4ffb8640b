use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager as RedisConnection;
use redis::AsyncCommands;
use synaptic_cache::CacheBackend;
use synaptic_core::SynapticError;

/// [`CacheBackend`] over a self-healing Redis connection.
///
/// A command that hits a dropped connection fails with
/// [`SynapticError::Store`]; the connection reconnects on its own and later
/// commands go through again.
///
/// Expiring writes use a single `SET key value PX ms`, so a value is never
/// stored without its TTL.
#[derive(Clone)]
pub struct RedisBackend {
    connection: RedisConnection,
}

impl RedisBackend {
    pub fn new(connection: RedisConnection) -> Self {
        Self { connection }
    }
}

/// Whole milliseconds for `PX`, rounding sub-millisecond TTLs up to 1.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, SynapticError> {
        let mut con = self.connection.clone();
        let raw: Option<String> = con
            .get(key)
            .await
            .map_err(|e| SynapticError::Store(format!("Redis GET error: {e}")))?;
        Ok(raw)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), SynapticError> {
        let mut con = self.connection.clone();
        match ttl {
            Some(ttl) => {
                let _: () = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query_async(&mut con)
                    .await
                    .map_err(|e| SynapticError::Store(format!("Redis SET PX error: {e}")))?;
            }
            None => {
                con.set::<_, _, ()>(key, value)
                    .await
                    .map_err(|e| SynapticError::Store(format!("Redis SET error: {e}")))?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SynapticError> {
        let mut con = self.connection.clone();
        con.del::<_, ()>(key)
            .await
            .map_err(|e| SynapticError::Store(format!("Redis DEL error: {e}")))
    }
}
