//! Core type definitions for the tag cache

use crate::error::{Result, TagCacheError};
use std::time::Duration;

/// Cached payload: null, bool, number, string, ordered list or string-keyed map
pub type CacheData = serde_json::Value;

/// Cache key type
pub type CacheKey = String;

/// Tag name type
pub type Tag = String;

/// An ordered sequence with at least one element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmpty<T> {
    items: Vec<T>,
}

impl<T> NonEmpty<T> {
    pub fn new(first: T) -> Self {
        Self { items: vec![first] }
    }

    /// `None` if `items` is empty
    pub fn from_vec(items: Vec<T>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self { items })
        }
    }

    /// Append an element
    pub fn and(mut self, item: T) -> Self {
        self.items.push(item);
        self
    }

    pub fn first(&self) -> &T {
        &self.items[0]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false; present for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl NonEmpty<String> {
    /// Build from string-like items, failing on an empty list.
    ///
    /// `what` names the items in the error, e.g. `"key"` or `"tag"`.
    pub fn try_from_iter<I, S>(items: I, what: &'static str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_vec(items.into_iter().map(Into::into).collect())
            .ok_or(TagCacheError::EmptyArgumentError(what))
    }
}

impl From<&str> for NonEmpty<String> {
    fn from(item: &str) -> Self {
        Self::new(item.to_string())
    }
}

impl From<String> for NonEmpty<String> {
    fn from(item: String) -> Self {
        Self::new(item)
    }
}

impl From<&String> for NonEmpty<String> {
    fn from(item: &String) -> Self {
        Self::new(item.clone())
    }
}

impl<T> TryFrom<Vec<T>> for NonEmpty<T> {
    type Error = TagCacheError;

    fn try_from(items: Vec<T>) -> Result<Self> {
        Self::from_vec(items).ok_or(TagCacheError::EmptyArgumentError("element"))
    }
}

impl TryFrom<&[&str]> for NonEmpty<String> {
    type Error = TagCacheError;

    fn try_from(items: &[&str]) -> Result<Self> {
        Self::try_from_iter(items.iter().copied(), "element")
    }
}

impl<const N: usize> TryFrom<[&str; N]> for NonEmpty<String> {
    type Error = TagCacheError;

    fn try_from(items: [&str; N]) -> Result<Self> {
        Self::try_from_iter(items, "element")
    }
}

impl<T> IntoIterator for NonEmpty<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a NonEmpty<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Per-call options for [`TagCache::set`](crate::cache::TagCache::set)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Overrides the configured default timeout when given and non-zero
    pub timeout: Option<Duration>,
}

impl SetOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Result of a [`TagCache::get`](crate::cache::TagCache::get)
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Single-key read; a missing entry is `Null`
    One(CacheData),

    /// Multi-key read, aligned with the requested keys; missing entries are `Null`
    Many(Vec<CacheData>),

    /// Some stored value did not parse, so every position is returned as
    /// stored (`None` for missing). Also used for single-key reads.
    Raw(Vec<Option<String>>),
}

impl Lookup {
    /// Decode raw backend values, falling back to [`Lookup::Raw`] for the
    /// whole result if any of them does not parse
    pub fn decode(raw: Vec<Option<String>>) -> Self {
        let decoded: std::result::Result<Vec<CacheData>, serde_json::Error> = raw
            .iter()
            .map(|value| match value {
                Some(text) => serde_json::from_str(text),
                None => Ok(CacheData::Null),
            })
            .collect();

        match decoded {
            Ok(mut values) if values.len() == 1 => Lookup::One(values.remove(0)),
            Ok(values) => Lookup::Many(values),
            Err(_) => Lookup::Raw(raw),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Lookup::Raw(_))
    }

    /// The single decoded value, `None` for multi-key or raw results
    pub fn into_value(self) -> Option<CacheData> {
        match self {
            Lookup::One(value) => Some(value),
            _ => None,
        }
    }

    /// Decoded values as a sequence, `None` for raw results
    pub fn into_values(self) -> Option<Vec<CacheData>> {
        match self {
            Lookup::One(value) => Some(vec![value]),
            Lookup::Many(values) => Some(values),
            Lookup::Raw(_) => None,
        }
    }

    /// Number of positions in the result
    pub fn len(&self) -> usize {
        match self {
            Lookup::One(_) => 1,
            Lookup::Many(values) => values.len(),
            Lookup::Raw(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
