//! Configuration for the tag cache

use crate::connection::RedisOptions;
use crate::error::{Result, TagCacheError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_REDIS_URL: &str = "TAG_CACHE_REDIS_URL";
pub const ENV_KEY_PREFIX: &str = "TAG_CACHE_KEY_PREFIX";
pub const ENV_DEFAULT_TIMEOUT: &str = "TAG_CACHE_DEFAULT_TIMEOUT";
pub const ENV_CONNECT_TIMEOUT: &str = "TAG_CACHE_CONNECT_TIMEOUT";
pub const ENV_RESPONSE_TIMEOUT: &str = "TAG_CACHE_RESPONSE_TIMEOUT";

/// Process-wide settings, fixed once the cache is constructed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagCacheConfig {
    /// Lifetime of entries written without a per-call timeout.
    /// `None` stores them without expiration.
    pub default_timeout: Option<Duration>,

    /// Backend connection settings
    pub storage: RedisOptions,
}

impl TagCacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> TagCacheConfigBuilder {
        TagCacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.default_timeout.is_some_and(|t| t.is_zero()) {
            return Err("default_timeout must be greater than 0".to_string());
        }

        self.storage.validate()
    }

    /// Load the configuration from the environment, reading `.env` first if present.
    ///
    /// Timeouts are given in seconds and may be fractional (`0.5`).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(url) = lookup(ENV_REDIS_URL) {
            builder = builder.redis_url(url);
        }
        if let Some(prefix) = lookup(ENV_KEY_PREFIX).filter(|p| !p.is_empty()) {
            builder = builder.key_prefix(prefix);
        }
        if let Some(secs) = lookup(ENV_DEFAULT_TIMEOUT) {
            builder = builder.default_timeout(parse_seconds(ENV_DEFAULT_TIMEOUT, &secs)?);
        }
        if let Some(secs) = lookup(ENV_CONNECT_TIMEOUT) {
            builder = builder.connection_timeout(parse_seconds(ENV_CONNECT_TIMEOUT, &secs)?);
        }
        if let Some(secs) = lookup(ENV_RESPONSE_TIMEOUT) {
            builder = builder.response_timeout(parse_seconds(ENV_RESPONSE_TIMEOUT, &secs)?);
        }

        let config = builder.build();
        config.validate().map_err(TagCacheError::ConfigError)?;
        Ok(config)
    }
}

fn parse_seconds(name: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| {
            TagCacheError::ConfigError(format!("{} must be a number of seconds, got {:?}", name, value))
        })
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct TagCacheConfigBuilder {
    default_timeout: Option<Duration>,
    storage: RedisOptions,
}

impl TagCacheConfigBuilder {
    /// Set the lifetime of entries written without a per-call timeout
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Replace all backend settings at once
    pub fn storage(mut self, storage: RedisOptions) -> Self {
        self.storage = storage;
        self
    }

    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.storage.url = url.into();
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage.key_prefix = Some(prefix.into());
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.storage.connection_timeout = timeout;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.storage.response_timeout = timeout;
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> TagCacheConfig {
        TagCacheConfig {
            default_timeout: self.default_timeout,
            storage: self.storage,
        }
    }
}
