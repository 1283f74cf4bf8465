//! Storage adapter trait for pluggable durable key/value backends.

use async_trait::async_trait;

use crate::result::AppResult;

/// A multi-key batch of puts and deletes applied as one unit.
///
/// The engine pairs slot-record writes with user-index writes; committing
/// them through one batch keeps the pair from diverging if the process
/// dies between writes.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Keys and values to write.
    pub puts: Vec<(String, String)>,
    /// Keys to remove.
    pub deletes: Vec<String>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a key/value write.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.puts.push((key.into(), value.into()));
        self
    }

    /// Queue a key/value write, serializing the value to JSON.
    pub fn put_json<T: serde::Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> AppResult<&mut Self> {
        let json = serde_json::to_string(value)?;
        self.puts.push((key.into(), json));
        Ok(self)
    }

    /// Queue a key removal.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.deletes.push(key.into());
        self
    }

    /// True when the batch carries no writes or removals.
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// Trait for durable key/value backends (in-memory or Redis).
///
/// All values are serialized as strings (JSON). Implementations must
/// serialize access per instance: one `commit` is never observed
/// half-applied by a concurrent `get` or `list`.
#[async_trait]
pub trait StorageAdapter: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if the key does not exist.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Write a value under a key, replacing any previous value.
    async fn put(&self, key: &str, value: &str) -> AppResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// List every `(key, value)` pair whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> AppResult<Vec<(String, String)>>;

    /// Apply a multi-key batch as one unit.
    async fn commit(&self, batch: WriteBatch) -> AppResult<()>;

    /// Get a typed value by deserializing from JSON.
    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> AppResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key).await? {
            Some(value) => {
                let parsed = serde_json::from_str(&value)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Write a typed value by serializing to JSON.
    async fn put_json<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> AppResult<()>
    where
        Self: Sized,
    {
        let json = serde_json::to_string(value)?;
        self.put(key, &json).await
    }
}
