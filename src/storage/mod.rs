//! Storage backend abstraction
//!
//! The tag cache never talks to a network client directly. It needs four
//! capabilities from the key-value service behind it, captured by the
//! [`Storage`] trait:
//!
//! - bulk read of string values, order preserved, missing keys as `None`
//! - all-or-nothing execution of a [`Batch`] (set membership + value writes)
//! - read of a set's full membership
//! - pipelined execution of a [`Batch`] of independent deletes
//!
//! [`RedisStorage`](crate::connection::RedisStorage) is the production
//! implementation; [`MemoryStorage`] keeps everything in process.

pub mod batch;
pub mod memory;

pub use batch::{Batch, Command};
pub use memory::MemoryStorage;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Key-value service consumed by [`TagCache`](crate::cache::TagCache)
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the string values stored at `keys`, one slot per key, in order
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Read every member of the set stored at `key`; a missing set is empty
    async fn members(&self, key: &str) -> Result<Vec<String>>;

    /// Apply every command of `batch` in one transaction.
    ///
    /// [`BatchRejectedError`](crate::error::TagCacheError::BatchRejectedError)
    /// means nothing was applied. Any other error makes no such promise.
    async fn execute_atomic(&self, batch: Batch) -> Result<()>;

    /// Send every command of `batch` in one round trip without atomicity
    async fn execute_pipelined(&self, batch: Batch) -> Result<()>;
}

#[async_trait]
impl<S> Storage for Arc<S>
where
    S: Storage + ?Sized,
{
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        (**self).get_many(keys).await
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        (**self).members(key).await
    }

    async fn execute_atomic(&self, batch: Batch) -> Result<()> {
        (**self).execute_atomic(batch).await
    }

    async fn execute_pipelined(&self, batch: Batch) -> Result<()> {
        (**self).execute_pipelined(batch).await
    }
}
