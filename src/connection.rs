//! Redis connection management
//!
//! [`RedisStorage`] is the production [`Storage`] backend. It holds a
//! multiplexed [`ConnectionManager`], which is cheap to clone and safe to
//! share between tasks, so the cache needs no locking of its own.

use crate::error::{millis, Result, TagCacheError};
use crate::storage::{Batch, Command, Storage};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Pipeline, RedisResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for the Redis backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisOptions {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`
    pub url: String,

    /// Prepended to every key the backend touches
    pub key_prefix: Option<String>,

    /// Upper bound for establishing the connection
    pub connection_timeout: Duration,

    /// Upper bound for a single round trip
    pub response_timeout: Duration,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            connection_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Validate the options
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("redis url must not be empty".to_string());
        }

        if self.connection_timeout.is_zero() {
            return Err("connection_timeout must be greater than 0".to_string());
        }

        if self.response_timeout.is_zero() {
            return Err("response_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Redis-backed [`Storage`]
#[derive(Clone)]
pub struct RedisStorage {
    connection: ConnectionManager,
    key_prefix: String,
    response_timeout: Duration,
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("key_prefix", &self.key_prefix)
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStorage {
    /// Connect to Redis
    ///
    /// # Example
    /// ```no_run
    /// use tag_cache::{RedisOptions, RedisStorage};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let storage = RedisStorage::connect(&RedisOptions::new("redis://127.0.0.1:6379")).await?;
    ///     assert!(storage.health_check().await?);
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(options: &RedisOptions) -> Result<Self> {
        options.validate().map_err(TagCacheError::ConfigError)?;

        info!("Connecting to Redis at {}", redact(&options.url));

        let client =
            Client::open(options.url.as_str()).map_err(|e| TagCacheError::ConfigError(e.to_string()))?;

        let connection = within(
            options.connection_timeout,
            "connect",
            ConnectionManager::new(client),
        )
        .await?
        .map_err(|e| TagCacheError::ConnectionError(e.to_string()))?;

        info!("Successfully connected to Redis");

        Ok(Self {
            connection,
            key_prefix: options.key_prefix.clone().unwrap_or_default(),
            response_timeout: options.response_timeout,
        })
    }

    /// Round trip a `PING`
    pub async fn health_check(&self) -> Result<bool> {
        debug!("Executing health check (PING)");

        let mut connection = self.connection.clone();
        let reply: String = self
            .round_trip("PING", redis::cmd("PING").query_async(&mut connection))
            .await?;

        Ok(reply == "PONG")
    }

    /// Bound a single request by the response timeout and classify its errors
    async fn round_trip<F, T>(&self, context: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        within(self.response_timeout, context, fut)
            .await?
            .map_err(|e| TagCacheError::from_redis(e, self.response_timeout, context))
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn pipeline(&self, batch: &Batch) -> Pipeline {
        let mut pipe = redis::pipe();

        for command in batch {
            match command {
                Command::AddMember { set, member } => {
                    pipe.cmd("SADD").arg(self.prefixed(set)).arg(member).ignore();
                }
                Command::Put { key, value, expiry } => {
                    let cmd = pipe.cmd("SET").arg(self.prefixed(key)).arg(value);
                    let cmd = match expiry.map(ExpiryArg::from) {
                        Some(ExpiryArg::Seconds(secs)) => cmd.arg("EX").arg(secs),
                        Some(ExpiryArg::Millis(millis)) => cmd.arg("PX").arg(millis),
                        None => cmd,
                    };
                    cmd.ignore();
                }
                Command::Delete { key } => {
                    pipe.cmd("DEL").arg(self.prefixed(key)).ignore();
                }
            }
        }

        pipe
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let keys: Vec<String> = keys.iter().map(|key| self.prefixed(key)).collect();
        let mut connection = self.connection.clone();

        // Always an array reply, even for a single key
        let values: Vec<Option<String>> = self
            .round_trip("MGET", redis::cmd("MGET").arg(&keys).query_async(&mut connection))
            .await?;

        Ok(values)
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();

        let members: Vec<String> = self
            .round_trip(
                "SMEMBERS",
                redis::cmd("SMEMBERS")
                    .arg(self.prefixed(key))
                    .query_async(&mut connection),
            )
            .await?;

        Ok(members)
    }

    /// Send `batch` as `MULTI/EXEC`.
    ///
    /// Only an aborted transaction (`EXECABORT`) is a
    /// [`BatchRejectedError`](TagCacheError::BatchRejectedError). A command
    /// failing inside `EXEC` does not undo the others, so it surfaces as a
    /// [`BackendError`](TagCacheError::BackendError).
    async fn execute_atomic(&self, batch: Batch) -> Result<()> {
        let mut pipe = self.pipeline(&batch);
        pipe.atomic();
        let mut connection = self.connection.clone();

        let () = self
            .round_trip("MULTI/EXEC", pipe.query_async(&mut connection))
            .await?;

        Ok(())
    }

    async fn execute_pipelined(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let pipe = self.pipeline(&batch);
        let mut connection = self.connection.clone();

        let () = self
            .round_trip("pipeline", pipe.query_async(&mut connection))
            .await?;

        Ok(())
    }
}

/// Expiration argument for `SET`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpiryArg {
    Seconds(u64),
    Millis(u64),
}

impl From<Duration> for ExpiryArg {
    fn from(ttl: Duration) -> Self {
        if ttl.subsec_nanos() == 0 {
            ExpiryArg::Seconds(ttl.as_secs())
        } else {
            // PX has millisecond granularity; never round a live entry down to 0
            let millis = ttl.as_nanos().div_ceil(1_000_000);
            ExpiryArg::Millis(u64::try_from(millis).unwrap_or(u64::MAX))
        }
    }
}

async fn within<F, T>(timeout: Duration, context: &str, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| TagCacheError::TimeoutError {
            timeout_ms: millis(timeout),
            context: context.to_string(),
        })
}

/// Hide credentials when logging a connection URL
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***{}", &url[..scheme], &url[at..])
        }
        _ => url.to_string(),
    }
}
