//! Engine configuration schemas.
//!
//! Bootstrap settings are deserialized from TOML files and environment
//! variables via the `config` crate. The *live* pool configuration is a
//! persisted storage record owned by the engine; the bootstrap values
//! only seed it on first start.

pub mod pool;
pub mod storage;

use serde::{Deserialize, Serialize};

pub use self::pool::{PoolConfig, PoolConfigUpdate};
pub use self::storage::{StorageBackend, StorageConfig};

use crate::error::AppError;

/// Root engine configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Initial pool settings, used to seed the persisted pool config.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Storage adapter selection.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl EngineConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `ROSTERHUB_`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ROSTERHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
