//! Tag Cache Demo Application
//!
//! Caches a few records under overlapping tags and invalidates them.
//!
//! Usage:
//!   cargo run --example tag_cache_demo
//!
//! Environment variables (also read from `.env`):
//!   TAG_CACHE_REDIS_URL        - Redis URL (default: redis://127.0.0.1:6379)
//!   TAG_CACHE_KEY_PREFIX       - Prefix for every Redis key (default: none)
//!   TAG_CACHE_DEFAULT_TIMEOUT  - Entry lifetime in seconds (default: none)
//!
//! Falls back to the in-memory backend when Redis is not reachable.

use serde_json::json;
use tag_cache::{MemoryStorage, NonEmpty, SetOptions, Storage, TagCache, TagCacheConfig};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    info!("=== Tag Cache Demo ===");

    let config = TagCacheConfig::from_env()?;

    match TagCache::connect(config.clone()).await {
        Ok(cache) => run(&cache).await?,
        Err(e) if e.is_connection() => {
            warn!("Redis not reachable ({}), using the in-memory backend", e);
            let cache = TagCache::new(MemoryStorage::new(), config)?;
            run(&cache).await?;
        }
        Err(e) => return Err(e.into()),
    }

    info!("=== Demo Complete ===");
    Ok(())
}

async fn run<S: Storage>(cache: &TagCache<S>) -> anyhow::Result<()> {
    info!("\n--- Storing threads ---");
    cache
        .set(
            "thread:asdf-345",
            &json!({ "id": "asdf-345", "content": { "title": "Hello" } }),
            &["user:asdf-123", "community:rust"],
            SetOptions::default(),
        )
        .await?;
    cache
        .set(
            "thread:asdf-234",
            &json!({ "id": "asdf-234", "content": { "title": "Second" } }),
            &["user:asdf-999", "community:rust"],
            SetOptions::default(),
        )
        .await?;
    cache
        .set(
            "thread:asdf-777",
            &json!({ "id": "asdf-777", "content": { "title": "Elsewhere" } }),
            &["user:asdf-999", "community:go"],
            SetOptions::default(),
        )
        .await?;

    let keys = NonEmpty::try_from(["thread:asdf-345", "thread:asdf-234", "thread:asdf-777"])?;
    info!("Cached: {:?}", cache.get(keys.clone()).await?);

    info!("\n--- Invalidating community:rust ---");
    let event = cache.invalidate("community:rust").await?;
    info!(
        "Removed {} entries for tags {:?}",
        event.distinct_keys(),
        event.tags
    );
    info!("After invalidation: {:?}", cache.get(keys.clone()).await?);

    info!("\n--- Cleaning up ---");
    cache
        .invalidate(NonEmpty::try_from(["user:asdf-123", "user:asdf-999", "community:go"])?)
        .await?;
    info!("After cleanup: {:?}", cache.get(keys).await?);

    Ok(())
}
