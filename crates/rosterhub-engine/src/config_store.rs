//! Persisted pool configuration: load-or-init, update validation,
//! persistence.
//!
//! The live [`PoolConfig`] is a single storage record. Bootstrap defaults
//! only seed it on first start; afterwards the persisted record wins.

use std::sync::Arc;

use tracing::info;

use rosterhub_core::config::{PoolConfig, PoolConfigUpdate};
use rosterhub_core::error::AppError;
use rosterhub_core::result::AppResult;
use rosterhub_core::traits::storage::StorageAdapter;

use crate::error::EngineError;
use crate::keys;

/// Loads, validates, and persists the pool configuration record.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    /// Durable key/value backend.
    storage: Arc<dyn StorageAdapter>,
}

impl ConfigStore {
    /// Create a config store over the given storage adapter.
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Read the persisted config, writing `defaults` on first start.
    pub async fn load_or_init(&self, defaults: PoolConfig) -> AppResult<PoolConfig> {
        if let Some(raw) = self.storage.get(&keys::pool_config()).await? {
            let config: PoolConfig = serde_json::from_str(&raw)?;
            return Ok(config);
        }

        defaults
            .check_bounds()
            .map_err(AppError::configuration)?;
        self.persist(&defaults).await?;
        info!(
            pool_size = defaults.pool_size,
            ttl_seconds = defaults.ttl_seconds,
            cohort = defaults.cohort,
            "Initialized pool config from defaults"
        );
        Ok(defaults)
    }

    /// Write the config record.
    pub async fn persist(&self, config: &PoolConfig) -> AppResult<()> {
        let json = serde_json::to_string(config)?;
        self.storage.put(&keys::pool_config(), &json).await
    }

    /// Merge a partial update onto the current config and validate it.
    ///
    /// Pool size is cohort-scoped: changing it without also advancing the
    /// cohort would shift the pool underneath live reservations, so that
    /// combination is rejected.
    pub fn apply_update(
        current: &PoolConfig,
        update: &PoolConfigUpdate,
    ) -> Result<PoolConfig, EngineError> {
        if update.is_empty() {
            return Err(EngineError::InvalidConfig(
                "update carries no changes".to_string(),
            ));
        }

        let merged = PoolConfig {
            pool_size: update.pool_size.unwrap_or(current.pool_size),
            ttl_seconds: update.ttl_seconds.unwrap_or(current.ttl_seconds),
            cohort: update.cohort.unwrap_or(current.cohort),
        };
        merged.check_bounds().map_err(EngineError::InvalidConfig)?;

        let pool_size_changed = merged.pool_size != current.pool_size;
        let cohort_changed = merged.cohort != current.cohort;
        if pool_size_changed && !cohort_changed {
            return Err(EngineError::InvalidConfig(
                "pool_size change requires a cohort change".to_string(),
            ));
        }

        Ok(merged)
    }
}
