//! Redis-backed value store.
//!
//! Uses one multiplexed async connection, opened lazily and dropped after any
//! failure so the next call reconnects. Every command is bounded by the
//! configured timeout.

use super::traits::{ValueStore, NO_EXPIRY};
use async_trait::async_trait;
use pulse_core::StorageError;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

const BACKEND: &str = "redis";

pub struct RedisStore {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Build a store for `url`. No connection is opened until first use.
    pub fn open(url: &str, op_timeout: Duration) -> Result<Self, StorageError> {
        let client =
            redis::Client::open(url).map_err(|e| StorageError::unreachable(BACKEND, e))?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            timeout: op_timeout,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StorageError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = timeout(self.timeout, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| StorageError::unreachable(BACKEND, "connect timed out"))?
            .map_err(|e| StorageError::unreachable(BACKEND, e))?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset_connection(&self) {
        self.connection.lock().await.take();
    }

    /// Run one command with the timeout applied, resetting the connection on
    /// failure.
    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection().await?;
        let result = match timeout(self.timeout, f(conn)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if e.is_io_error() || e.is_connection_dropped() => {
                StorageError::unreachable(BACKEND, e)
            }
            Ok(Err(e)) => StorageError::query_failed(BACKEND, format!("{op}: {e}")),
            Err(_) => StorageError::unreachable(BACKEND, format!("{op} timed out")),
        };
        self.reset_connection().await;
        Err(result)
    }
}

#[async_trait]
impl ValueStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.run("GET", |mut conn| async move {
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StorageError> {
        self.run("SET", |mut conn| async move {
            if ttl_seconds == NO_EXPIRY {
                conn.set::<_, _, ()>(key, value).await
            } else {
                conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.run("DEL", |mut conn| async move { conn.del::<_, ()>(key).await })
            .await
    }

    async fn increment(&self, key: &str, window_seconds: u64) -> Result<u64, StorageError> {
        let window = i64::try_from(window_seconds).unwrap_or(i64::MAX);
        self.run("INCR", |mut conn| async move {
            let count: u64 = conn.incr(key, 1_u64).await?;
            if count == 1 && window > 0 {
                let _: bool = conn.expire(key, window).await?;
            }
            Ok(count)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.run("PING", |mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}
