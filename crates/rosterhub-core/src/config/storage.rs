//! Storage adapter configuration.

use serde::{Deserialize, Serialize};

/// Which storage adapter backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-process map, lost on restart. Suitable for tests and
    /// single-process deployments.
    Memory,
    /// Redis-backed durable storage.
    Redis,
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::Memory
    }
}

/// Storage adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Redis settings, used when `backend` is `redis`.
    #[serde(default)]
    pub redis: RedisStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            redis: RedisStorageConfig::default(),
        }
    }
}

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisStorageConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Prefix applied to every key written by this engine instance.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisStorageConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    String::new()
}
