//! Tag invalidation
//!
//! Invalidating a set of tags runs in three steps:
//! 1. resolve every tag's member set (`tags:<tag>`), concurrently
//! 2. queue one delete per resolved key (`data:<key>`) and one per tag
//! 3. send the deletes as a single pipeline
//!
//! Deletes are idempotent, so step 3 needs no atomicity and a failed call
//! can simply be repeated. A failure while resolving aborts before anything
//! is deleted.

use crate::cache::{
    namespace::{data_key, tag_key},
    store::TagCache,
    types::{CacheKey, NonEmpty, Tag},
};
use crate::error::Result;
use crate::storage::{Batch, Storage};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Record of a completed invalidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Tags that were invalidated, in call order
    pub tags: Vec<Tag>,

    /// Keys resolved from the tags; a key shared by several tags appears once per tag
    pub keys: Vec<CacheKey>,

    /// When the deletes were committed
    pub timestamp: DateTime<Utc>,
}

impl InvalidationEvent {
    pub fn new(tags: Vec<Tag>, keys: Vec<CacheKey>) -> Self {
        Self {
            tags,
            keys,
            timestamp: Utc::now(),
        }
    }

    /// Distinct keys whose data was deleted
    pub fn distinct_keys(&self) -> usize {
        let mut keys: Vec<&CacheKey> = self.keys.iter().collect();
        keys.sort();
        keys.dedup();
        keys.len()
    }
}

/// Build the fan-out delete for `keys` and `tags`
pub(crate) fn fan_out(keys: &[CacheKey], tags: &[Tag]) -> Batch {
    let mut batch = Batch::with_capacity(keys.len() + tags.len());
    for key in keys {
        batch.delete(data_key(key));
    }
    for tag in tags {
        batch.delete(tag_key(tag));
    }
    batch
}

impl<S: Storage> TagCache<S> {
    /// Delete every entry carrying any of `tags`, then the tags themselves.
    ///
    /// Tags without members are still deleted, which is a no-op. Invalidating
    /// the same tag twice is not an error.
    ///
    /// # Example
    /// ```
    /// use tag_cache::{Lookup, MemoryStorage, SetOptions, TagCache, TagCacheConfig};
    /// use serde_json::json;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> tag_cache::Result<()> {
    /// let cache = TagCache::new(MemoryStorage::new(), TagCacheConfig::default())?;
    /// cache.set("a", &json!("data"), &["tag-1"], SetOptions::default()).await?;
    ///
    /// let event = cache.invalidate("tag-1").await?;
    /// assert_eq!(event.keys, vec!["a".to_string()]);
    /// assert_eq!(cache.get("a").await?, Lookup::One(json!(null)));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn invalidate(&self, tags: impl Into<NonEmpty<Tag>>) -> Result<InvalidationEvent> {
        let tags: NonEmpty<Tag> = tags.into();
        let tags = tags.into_vec();

        let resolved = try_join_all(
            tags.iter()
                .map(|tag| async move { self.storage.members(&tag_key(tag)).await }),
        )
        .await?;
        let keys: Vec<CacheKey> = resolved.into_iter().flatten().collect();

        let batch = fan_out(&keys, &tags);
        debug!(
            tags = tags.len(),
            keys = keys.len(),
            deletes = batch.len(),
            "Invalidating tags"
        );
        self.storage.execute_pipelined(batch).await?;

        Ok(InvalidationEvent::new(tags, keys))
    }
}
