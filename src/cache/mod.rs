//! # Tag-Indexed Cache
//!
//! Callers store data under a key together with zero or more tags, and later
//! drop every entry sharing a tag in one call.
//!
//! ## Layout in the backend
//!
//! Two logical stores share one key space (see [`namespace`]):
//! - `data:<key>` holds the JSON-encoded payload, optionally with a TTL
//! - `tags:<tag>` holds the set of keys currently tagged with `<tag>`
//!
//! ## Consistency
//!
//! A write records its tag memberships and its payload atomically. Expiry
//! and invalidation run independently, so a tag set may still name keys whose
//! data is already gone; such keys read as `Null`, never as an error.
//! Concurrent writes and invalidations on overlapping tags are not ordered
//! against each other.
//!
//! ## Example
//!
//! ```rust
//! use tag_cache::{Lookup, MemoryStorage, SetOptions, TagCache, TagCacheConfig};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn example() -> tag_cache::Result<()> {
//! let config = TagCacheConfig::builder()
//!     .default_timeout(Duration::from_secs(3600))
//!     .build();
//! let cache = TagCache::new(MemoryStorage::new(), config)?;
//!
//! cache
//!     .set("thread:345", &json!({ "title": "Hello" }), &["user:123"], SetOptions::default())
//!     .await?;
//!
//! if let Lookup::One(thread) = cache.get("thread:345").await? {
//!     println!("Cache hit: {}", thread);
//! }
//!
//! cache.invalidate("user:123").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod invalidation;
pub mod namespace;
pub mod store;
pub mod types;

pub use config::{TagCacheConfig, TagCacheConfigBuilder};
pub use invalidation::InvalidationEvent;
pub use store::TagCache;
pub use types::{CacheData, CacheKey, Lookup, NonEmpty, SetOptions, Tag};
