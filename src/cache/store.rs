//! Tag cache: read and write paths

use crate::cache::{
    config::TagCacheConfig,
    namespace::{data_key, tag_key},
    types::{CacheData, CacheKey, Lookup, NonEmpty, SetOptions},
};
use crate::connection::RedisStorage;
use crate::error::{millis, Result, TagCacheError};
use crate::storage::{Batch, Storage};
use std::time::Duration;
use tracing::{debug, info};

/// Key-value cache whose entries can be invalidated in groups by tag
///
/// Holds only immutable configuration and a storage handle, so a single
/// instance can be shared (e.g. behind an `Arc`) by any number of tasks.
#[derive(Debug)]
pub struct TagCache<S = RedisStorage> {
    pub(crate) storage: S,
    config: TagCacheConfig,
}

impl TagCache<RedisStorage> {
    /// Connect to the Redis backend described by `config.storage`
    ///
    /// # Example
    /// ```no_run
    /// use tag_cache::{TagCache, TagCacheConfig};
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let config = TagCacheConfig::builder()
    ///         .redis_url("redis://127.0.0.1:6379")
    ///         .default_timeout(Duration::from_secs(3600))
    ///         .build();
    ///     let cache = TagCache::connect(config).await?;
    ///     cache.invalidate("threads").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: TagCacheConfig) -> Result<Self> {
        config.validate().map_err(TagCacheError::ConfigError)?;
        let storage = RedisStorage::connect(&config.storage).await?;
        Ok(Self { storage, config })
    }
}

impl<S: Storage> TagCache<S> {
    /// Create a cache over an existing storage backend.
    ///
    /// Only `config.default_timeout` is used; backend settings belong to
    /// whoever built `storage`.
    pub fn new(storage: S, config: TagCacheConfig) -> Result<Self> {
        config.validate().map_err(TagCacheError::ConfigError)?;
        info!(
            "Initializing tag cache (default timeout: {:?})",
            config.default_timeout
        );
        Ok(Self { storage, config })
    }

    pub fn config(&self) -> &TagCacheConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read one or more entries in a single round trip.
    ///
    /// A single key yields [`Lookup::One`], several keys [`Lookup::Many`]
    /// aligned with the input. Missing or expired entries read as `Null`. If
    /// any stored value fails to parse, the whole result is [`Lookup::Raw`].
    ///
    /// # Example
    /// ```
    /// use tag_cache::{Lookup, MemoryStorage, NonEmpty, SetOptions, TagCache, TagCacheConfig};
    /// use serde_json::json;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> tag_cache::Result<()> {
    /// let cache = TagCache::new(MemoryStorage::new(), TagCacheConfig::default())?;
    /// cache.set("a", &json!("data-a"), &["some-tag"], SetOptions::default()).await?;
    ///
    /// assert_eq!(cache.get("a").await?, Lookup::One(json!("data-a")));
    ///
    /// let keys = NonEmpty::try_from(["a", "b"])?;
    /// assert_eq!(
    ///     cache.get(keys).await?,
    ///     Lookup::Many(vec![json!("data-a"), json!(null)])
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get(&self, keys: impl Into<NonEmpty<CacheKey>>) -> Result<Lookup> {
        let keys: NonEmpty<CacheKey> = keys.into();
        let backend_keys: Vec<String> = keys.iter().map(|key| data_key(key)).collect();

        let raw = self.storage.get_many(&backend_keys).await?;
        let lookup = Lookup::decode(raw);

        debug!(
            keys = keys.len(),
            raw = lookup.is_raw(),
            "Read {} cache entries",
            keys.len()
        );
        Ok(lookup)
    }

    /// Store `data` under `key` and add `key` to every tag in `tags`.
    ///
    /// All writes go out as one atomic batch: either every tag membership and
    /// the data entry are recorded, or nothing is. Writing an existing key
    /// replaces its data; tag memberships accumulate.
    pub async fn set<T: AsRef<str>>(
        &self,
        key: &str,
        data: &CacheData,
        tags: &[T],
        options: SetOptions,
    ) -> Result<()> {
        let payload = serde_json::to_string(data)?;
        let expiry = self.resolve_timeout(options);

        let mut batch = Batch::with_capacity(tags.len() + 1);
        for tag in tags {
            batch.add_member(tag_key(tag.as_ref()), key);
        }
        batch.put(data_key(key), payload, expiry);

        self.storage.execute_atomic(batch).await?;

        debug!(
            key,
            tags = tags.len(),
            expiry_ms = expiry.map(millis),
            "Stored cache entry"
        );
        Ok(())
    }

    /// Per-call timeout if given and non-zero, otherwise the configured default
    fn resolve_timeout(&self, options: SetOptions) -> Option<Duration> {
        options
            .timeout
            .filter(|timeout| !timeout.is_zero())
            .or(self.config.default_timeout)
    }
}
