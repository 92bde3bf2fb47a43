//! Redis-backed cache handle

use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;
use tracing::info;

use super::CacheHandle;
use crate::config::CacheArgs;
use crate::types::{GateError, Result};

/// Cache handle bound to one Redis endpoint
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
    endpoint: String,
}

impl RedisCache {
    /// Connect and verify the connection with a ping.
    ///
    /// Every failure here is a connection-establishment failure.
    pub async fn connect(args: &CacheArgs) -> Result<Self> {
        let endpoint = args.endpoint_key();
        info!("Connecting to cache at {}", endpoint);

        let client = ::redis::Client::open(args.url())
            .map_err(|e| GateError::CacheUnavailable(format!("Invalid cache URL: {}", e)))?;

        let conn = tokio::time::timeout(
            args.connect_timeout(),
            client.get_multiplexed_tokio_connection(),
        )
        .await
        .map_err(|_| GateError::CacheUnavailable(format!("Connect to {} timed out", endpoint)))?
        .map_err(|e| GateError::CacheUnavailable(format!("Failed to connect: {}", e)))?;

        let cache = Self { conn, endpoint };
        cache
            .ping()
            .await
            .map_err(|e| GateError::CacheUnavailable(e.to_string()))?;

        info!("Connected to cache at {}", cache.endpoint);
        Ok(cache)
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[async_trait::async_trait]
impl CacheHandle for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self.conn().get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _: () = self.conn().set(key, value).await?;
        Ok(())
    }

    async fn incr(&self, key: &str, by: i64) -> Result<Option<i64>> {
        let value: i64 = self.conn().incr(key, by).await?;
        Ok(Some(value))
    }

    async fn set_many(&self, entries: &[(String, String)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut pipe = ::redis::pipe();
        for (key, value) in entries {
            pipe.set(key, value).ignore();
        }
        let mut conn = self.conn();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let value: Option<String> = self.conn().hget(key, field).await?;
        Ok(value)
    }

    async fn hset_many(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let _: () = self.conn().hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

