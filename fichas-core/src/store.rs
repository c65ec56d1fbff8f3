//! Seams towards the external key/value store.
//!
//! The engine never writes anything itself. It asks an [`ExistenceOracle`]
//! whether a key is taken and hands back a [`WriteSet`] of path/value pairs
//! that the caller must apply as one atomic multi-path update.

use crate::slug::Slug;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Errors reported by the external store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected at {path}: {reason}")]
    Rejected { path: String, reason: String },
}

/// Answers "is this key already used?" for one collection.
///
/// The answer may be stale by the time the caller writes; nothing here is a
/// reservation.
#[async_trait]
pub trait ExistenceOracle: Send + Sync {
    async fn exists(&self, id: &Slug) -> Result<bool, StoreError>;
}

#[async_trait]
impl ExistenceOracle for HashSet<Slug> {
    async fn exists(&self, id: &Slug) -> Result<bool, StoreError> {
        Ok(self.contains(id))
    }
}

#[async_trait]
impl ExistenceOracle for BTreeSet<Slug> {
    async fn exists(&self, id: &Slug) -> Result<bool, StoreError> {
        Ok(self.contains(id))
    }
}

/// Records already present in a collection, keyed by id.
pub type Snapshot = BTreeMap<Slug, Value>;

/// Join a collection path and an id into a record path.
pub fn record_path(collection_path: &str, id: &Slug) -> String {
    format!("{}/{}", collection_path.trim_end_matches('/'), id)
}

/// A leaf elsewhere in the store that holds a record id, e.g.
/// `assignments/<player>/sheetId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackReference {
    pub path: String,
}

impl BackReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// A batch of path/value writes to be applied atomically.
///
/// A `null` value deletes the path. Writing the same path twice keeps the
/// last value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteSet {
    writes: BTreeMap<String, Value>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write, returning the value it replaced in this batch.
    pub fn set(&mut self, path: impl Into<String>, value: Value) -> Option<Value> {
        self.writes.insert(path.into(), value)
    }

    /// Queue a delete.
    pub fn delete(&mut self, path: impl Into<String>) {
        self.writes.insert(path.into(), Value::Null);
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.writes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.writes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.writes.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.writes.keys().map(String::as_str)
    }

    /// Fold another batch into this one; its writes win on conflict.
    pub fn extend(&mut self, other: WriteSet) {
        self.writes.extend(other.writes);
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.writes
    }
}

impl IntoIterator for WriteSet {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}
