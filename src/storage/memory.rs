//! In-process storage backend
//!
//! Mirrors the parts of Redis semantics the tag cache relies on: string and
//! set slots, `WRONGTYPE` errors, per-slot expiry, `MULTI/EXEC` style atomic
//! batches and plain pipelines.

use crate::error::{Result, TagCacheError};
use crate::storage::{Batch, Command, Storage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const WRONGTYPE: &str =
    "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Text,
    Members,
}

#[derive(Debug, Clone)]
enum SlotValue {
    Text(String),
    Members(HashSet<String>),
}

impl SlotValue {
    fn kind(&self) -> SlotKind {
        match self {
            SlotValue::Text(_) => SlotKind::Text,
            SlotValue::Members(_) => SlotKind::Members,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    value: SlotValue,
    expires_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Internal key space
#[derive(Debug, Default)]
struct Keyspace {
    slots: HashMap<String, Slot>,

    /// Earliest expiry that may still be stored; never later than the real one
    next_expiry: Option<DateTime<Utc>>,
}

impl Keyspace {
    fn live(&self, key: &str, now: DateTime<Utc>) -> Option<&Slot> {
        self.slots.get(key).filter(|slot| !slot.is_expired(now))
    }

    /// Drop every expired slot once the earliest known expiry has passed
    fn sweep(&mut self, now: DateTime<Utc>) {
        if !self.next_expiry.is_some_and(|at| now >= at) {
            return;
        }

        self.slots.retain(|_, slot| !slot.is_expired(now));
        self.next_expiry = self.slots.values().filter_map(|slot| slot.expires_at).min();
    }

    /// Fail with the error `batch` would hit, without changing anything
    fn check(&self, batch: &Batch, now: DateTime<Utc>) -> Result<()> {
        // Kind of every key written so far in the batch; `None` once deleted
        let mut staged: HashMap<&str, Option<SlotKind>> = HashMap::new();

        for command in batch {
            match command {
                Command::AddMember { set, .. } => {
                    let kind = match staged.get(set.as_str()) {
                        Some(kind) => *kind,
                        None => self.live(set, now).map(|slot| slot.value.kind()),
                    };
                    if kind == Some(SlotKind::Text) {
                        return Err(TagCacheError::BackendError(WRONGTYPE.to_string()));
                    }
                    staged.insert(set.as_str(), Some(SlotKind::Members));
                }
                Command::Put { key, expiry, .. } => {
                    if let Some(ttl) = expiry {
                        deadline(now, *ttl)?;
                    }
                    staged.insert(key.as_str(), Some(SlotKind::Text));
                }
                Command::Delete { key } => {
                    staged.insert(key.as_str(), None);
                }
            }
        }

        Ok(())
    }

    /// Apply one command; expired slots must already be swept
    fn apply(&mut self, command: &Command, now: DateTime<Utc>) -> Result<()> {
        match command {
            Command::AddMember { set, member } => match self.slots.get_mut(set) {
                Some(Slot {
                    value: SlotValue::Members(members),
                    ..
                }) => {
                    members.insert(member.clone());
                }
                Some(_) => return Err(TagCacheError::BackendError(WRONGTYPE.to_string())),
                None => {
                    self.slots.insert(
                        set.clone(),
                        Slot {
                            value: SlotValue::Members(HashSet::from([member.clone()])),
                            expires_at: None,
                        },
                    );
                }
            },

            Command::Put { key, value, expiry } => {
                let expires_at = match expiry {
                    Some(ttl) => Some(deadline(now, *ttl)?),
                    None => None,
                };
                if let Some(at) = expires_at {
                    self.next_expiry = Some(self.next_expiry.map_or(at, |next| next.min(at)));
                }
                self.slots.insert(
                    key.clone(),
                    Slot {
                        value: SlotValue::Text(value.clone()),
                        expires_at,
                    },
                );
            }

            Command::Delete { key } => {
                self.slots.remove(key);
            }
        }

        Ok(())
    }
}

fn deadline(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    if ttl.is_zero() {
        return Err(TagCacheError::BackendError(
            "ERR invalid expire time in 'set' command".to_string(),
        ));
    }

    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            TagCacheError::BackendError("ERR invalid expire time in 'set' command".to_string())
        })
}

/// Key-value store kept in process memory.
///
/// Clones share the same key space, so one instance can back several caches.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    keyspace: Arc<RwLock<Keyspace>>,
    disconnected: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a connection error
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    /// Undo [`disconnect`](Self::disconnect)
    pub fn reconnect(&self) {
        self.disconnected.store(false, Ordering::SeqCst);
    }

    /// Number of keys that have not expired
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        let keyspace = self.keyspace.read().await;
        keyspace
            .slots
            .values()
            .filter(|slot| !slot.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether `key` holds a live value of any kind
    pub async fn contains_key(&self, key: &str) -> bool {
        let keyspace = self.keyspace.read().await;
        keyspace.live(key, Utc::now()).is_some()
    }

    /// Remaining lifetime of `key`, `None` if missing or without expiry
    pub async fn time_to_live(&self, key: &str) -> Option<Duration> {
        let now = Utc::now();
        let keyspace = self.keyspace.read().await;
        let expires_at = keyspace.live(key, now)?.expires_at?;
        (expires_at - now).to_std().ok()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(TagCacheError::ConnectionError(
                "memory storage is disconnected".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.ensure_connected()?;

        let now = Utc::now();
        let mut keyspace = self.keyspace.write().await;
        keyspace.sweep(now);
        Ok(keys
            .iter()
            .map(|key| match keyspace.live(key, now) {
                Some(Slot {
                    value: SlotValue::Text(text),
                    ..
                }) => Some(text.clone()),
                _ => None,
            })
            .collect())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        self.ensure_connected()?;

        let now = Utc::now();
        let mut keyspace = self.keyspace.write().await;
        keyspace.sweep(now);
        match keyspace.live(key, now) {
            Some(Slot {
                value: SlotValue::Members(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(TagCacheError::BackendError(WRONGTYPE.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn execute_atomic(&self, batch: Batch) -> Result<()> {
        self.ensure_connected()?;

        let now = Utc::now();
        let mut keyspace = self.keyspace.write().await;
        keyspace.sweep(now);

        keyspace
            .check(&batch, now)
            .map_err(TagCacheError::into_batch_rejection)?;
        for command in &batch {
            keyspace.apply(command, now)?;
        }

        Ok(())
    }

    async fn execute_pipelined(&self, batch: Batch) -> Result<()> {
        self.ensure_connected()?;

        let now = Utc::now();
        let mut keyspace = self.keyspace.write().await;
        keyspace.sweep(now);
        let mut first_error = None;

        for command in &batch {
            if let Err(e) = keyspace.apply(command, now) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
