//! # tag-cache
//!
//! A tag-indexed invalidation layer over Redis.
//!
//! ## Features
//!
//! - Store any JSON value under a key, tagged with any number of tags
//! - Bulk reads in one round trip, positionally aligned with the requested keys
//! - Atomic writes: tag memberships and data land together or not at all
//! - Invalidate every entry sharing a tag with a single pipelined fan-out delete
//! - Default and per-write expiration delegated to the backend
//! - Pluggable [`Storage`] backend, with Redis and in-memory implementations
//!
//! ## Usage
//!
//! ```no_run
//! use tag_cache::{Lookup, NonEmpty, SetOptions, TagCache, TagCacheConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = TagCache::connect(TagCacheConfig::from_env()?).await?;
//!
//!     cache.set("a", &json!("data"), &["tag-1", "tag-2"], SetOptions::default()).await?;
//!     cache.set("b", &json!([1, 2]), &["tag-2", "tag-3"], SetOptions::default()).await?;
//!
//!     let values = cache.get(NonEmpty::try_from(["a", "b"])?).await?;
//!     println!("{:?}", values);
//!
//!     // Drops both "a" and "b"
//!     cache.invalidate("tag-2").await?;
//!     assert_eq!(cache.get("a").await?, Lookup::One(json!(null)));
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Every backend failure is returned as a [`TagCacheError`]; nothing is
//! retried. A stored value that is not valid JSON is not an error: the read
//! returns [`Lookup::Raw`] instead.

pub mod cache;
pub mod connection;
pub mod error;
pub mod storage;

// Re-export main types for convenience
pub use cache::{
    CacheData, CacheKey, InvalidationEvent, Lookup, NonEmpty, SetOptions, Tag, TagCache,
    TagCacheConfig, TagCacheConfigBuilder,
};
pub use connection::{RedisOptions, RedisStorage};
pub use error::{Result, TagCacheError};
pub use storage::{Batch, Command, MemoryStorage, Storage};
