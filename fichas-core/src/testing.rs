//! In-memory key/value store.
//!
//! Keys are full record paths (`sheets/goblin`, `assignments/p1/sheetId`).
//! Write sets are applied under one lock, so readers observe either none or
//! all of a batch.

use crate::config::EngineConfig;
use crate::import::{self, ImportError};
use crate::slug::{ImportMode, Slug};
use crate::store::{ExistenceOracle, Snapshot, StoreError, WriteSet};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<String, Value>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: BTreeMap<String, Value>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            offline: Arc::default(),
        }
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, path: &str) -> Option<Value> {
        self.data.read().await.get(path).cloned()
    }

    pub async fn insert(&self, path: impl Into<String>, value: Value) {
        self.data.write().await.insert(path.into(), value);
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Copy of every key and value.
    pub async fn dump(&self) -> BTreeMap<String, Value> {
        self.data.read().await.clone()
    }

    /// Apply a write set atomically. `null` deletes.
    pub async fn apply(&self, writes: &WriteSet) -> Result<(), StoreError> {
        self.check_online()?;
        if let Some(path) = writes.paths().find(|p| !is_valid_path(p)) {
            return Err(StoreError::Rejected {
                path: path.to_string(),
                reason: "empty path segment".to_string(),
            });
        }

        let mut data = self.data.write().await;
        for (path, value) in writes.iter() {
            if value.is_null() {
                data.remove(path);
            } else {
                data.insert(path.clone(), value.clone());
            }
        }
        debug!(writes = writes.len(), "Applied write set");
        Ok(())
    }

    /// Records directly under `collection_path`, keyed by id.
    pub async fn snapshot(&self, collection_path: &str) -> Result<Snapshot, StoreError> {
        self.check_online()?;
        let prefix = format!("{}/", collection_path.trim_end_matches('/'));
        let data = self.data.read().await;
        Ok(data
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, v)| {
                let id = &k[prefix.len()..];
                Slug::parse(id).ok().map(|slug| (slug, v.clone()))
            })
            .collect())
    }

    /// Existence oracle scoped to one collection.
    pub fn collection(&self, collection_path: impl Into<String>) -> CollectionOracle {
        CollectionOracle {
            store: self.clone(),
            path: collection_path.into().trim_end_matches('/').to_string(),
        }
    }

    /// Snapshot the character collection, run the import pipeline and apply
    /// the resulting batch.
    pub async fn import(
        &self,
        text: &str,
        mode: ImportMode,
        now_ms: i64,
        config: &EngineConfig,
    ) -> Result<WriteSet, ImportError> {
        let existing = self.snapshot(&config.characters_path).await?;
        let writes = import::import_json(text, mode, &existing, now_ms, config)?;
        self.apply(&writes).await?;
        Ok(writes)
    }
}

fn is_valid_path(path: &str) -> bool {
    !path.is_empty() && path.split('/').all(|segment| !segment.is_empty())
}

/// A [`MemoryStore`] viewed as one collection of records.
#[derive(Debug, Clone)]
pub struct CollectionOracle {
    store: MemoryStore,
    path: String,
}

#[async_trait]
impl ExistenceOracle for CollectionOracle {
    async fn exists(&self, id: &Slug) -> Result<bool, StoreError> {
        self.store.check_online()?;
        let key = format!("{}/{}", self.path, id);
        Ok(self.store.data.read().await.contains_key(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_apply_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.insert("sheets/goblin", json!({ "name": "Goblin" })).await;

        let mut writes = WriteSet::new();
        writes.set("sheets/orc", json!({ "name": "Orc" }));
        writes.set("sheets//bad", json!(1));
        assert!(matches!(
            store.apply(&writes).await,
            Err(StoreError::Rejected { .. })
        ));
        assert_eq!(store.len().await, 1);

        let mut writes = WriteSet::new();
        writes.set("sheets/orc", json!({ "name": "Orc" }));
        writes.delete("sheets/goblin");
        store.apply(&writes).await.unwrap();
        assert!(store.get("sheets/goblin").await.is_none());
        assert!(store.get("sheets/orc").await.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_only_direct_children() {
        let store = MemoryStore::new();
        store.insert("sheets/a", json!({})).await;
        store.insert("sheets/b", json!({})).await;
        store.insert("sheetsx/c", json!({})).await;
        store.insert("assignments/p1/sheetId", json!("a")).await;

        let snapshot = store.snapshot("sheets").await.unwrap();
        let ids: Vec<&str> = snapshot.keys().map(Slug::as_str).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_collection_oracle_and_offline() {
        let store = MemoryStore::new();
        store.insert("sheets/goblin", json!({})).await;
        let oracle = store.collection("sheets");
        let goblin = Slug::parse("goblin").unwrap();
        assert!(oracle.exists(&goblin).await.unwrap());
        assert!(!oracle.exists(&Slug::parse("orc").unwrap()).await.unwrap());

        store.set_offline(true);
        assert!(matches!(
            oracle.exists(&goblin).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
