//! Test backends shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tag_cache::{Batch, MemoryStorage, Result, Storage};

/// Which storage method a batch was sent through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Atomic,
    Pipelined,
}

/// Forwards to a [`MemoryStorage`] and records every batch it is handed
#[derive(Debug, Clone, Default)]
pub struct RecordingStorage {
    pub inner: MemoryStorage,
    batches: Arc<Mutex<Vec<(Mode, Batch)>>>,
    bulk_reads: Arc<Mutex<Vec<Vec<String>>>>,
    member_reads: Arc<Mutex<Vec<String>>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<(Mode, Batch)> {
        self.batches.lock().unwrap().clone()
    }

    /// Key lists passed to `get_many`, one entry per call
    pub fn bulk_reads(&self) -> Vec<Vec<String>> {
        self.bulk_reads.lock().unwrap().clone()
    }

    pub fn member_reads(&self) -> Vec<String> {
        self.member_reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.bulk_reads.lock().unwrap().push(keys.to_vec());
        self.inner.get_many(keys).await
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        self.member_reads.lock().unwrap().push(key.to_string());
        self.inner.members(key).await
    }

    async fn execute_atomic(&self, batch: Batch) -> Result<()> {
        self.batches
            .lock()
            .unwrap()
            .push((Mode::Atomic, batch.clone()));
        self.inner.execute_atomic(batch).await
    }

    async fn execute_pipelined(&self, batch: Batch) -> Result<()> {
        self.batches
            .lock()
            .unwrap()
            .push((Mode::Pipelined, batch.clone()));
        self.inner.execute_pipelined(batch).await
    }
}

/// Writes a value that is not valid JSON straight into the data namespace
pub async fn put_raw(storage: &MemoryStorage, key: &str, value: &str) {
    let mut batch = Batch::new();
    batch.put(format!("data:{}", key), value, None);
    storage.execute_atomic(batch).await.unwrap();
}
