//! In-memory storage adapter backed by an ordered map.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use rosterhub_core::result::AppResult;
use rosterhub_core::traits::storage::{StorageAdapter, WriteBatch};

/// In-memory storage adapter using a Tokio mutex for serialized access.
///
/// A `BTreeMap` keeps keys ordered so prefix listing is a range scan.
/// Contents are lost on restart; suitable for tests and single-process
/// deployments only.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    /// Protected key/value map.
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries. Test helper.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// True when no entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<(String, String)>> {
        let entries = self.entries.lock().await;
        let matched: Vec<(String, String)> = entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(matched)
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        // One lock acquisition for the whole batch: readers never observe
        // a half-applied commit.
        let mut entries = self.entries.lock().await;
        let (puts, deletes) = (batch.puts.len(), batch.deletes.len());
        for (key, value) in batch.puts {
            entries.insert(key, value);
        }
        for key in batch.deletes {
            entries.remove(&key);
        }
        debug!(puts, deletes, "Committed write batch");
        Ok(())
    }
}
