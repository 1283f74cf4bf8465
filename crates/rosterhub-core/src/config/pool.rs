//! Slot pool configuration.

use serde::{Deserialize, Serialize};

/// Smallest allowed pool size.
pub const MIN_POOL_SIZE: u32 = 1;
/// Largest allowed pool size.
pub const MAX_POOL_SIZE: u32 = 100;
/// Smallest allowed reservation TTL.
pub const MIN_TTL_SECONDS: u64 = 1;
/// Largest allowed reservation TTL (30 days).
pub const MAX_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;
/// Smallest allowed cohort number.
pub const MIN_COHORT: u32 = 1;
/// Largest allowed cohort number.
pub const MAX_COHORT: u32 = 999;

/// The live slot pool configuration.
///
/// A single record of this shape is persisted in storage and governs which
/// slot references are currently reservable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of slots available within the current cohort.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Duration a reserved slot remains valid before lazily reverting
    /// to available.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Cohort number partitioning the slot namespace.
    #[serde(default = "default_cohort")]
    pub cohort: u32,
}

impl PoolConfig {
    /// Check that every field sits within its allowed bounds.
    pub fn check_bounds(&self) -> Result<(), String> {
        if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&self.pool_size) {
            return Err(format!(
                "pool_size {} out of bounds [{MIN_POOL_SIZE}, {MAX_POOL_SIZE}]",
                self.pool_size
            ));
        }
        if !(MIN_TTL_SECONDS..=MAX_TTL_SECONDS).contains(&self.ttl_seconds) {
            return Err(format!(
                "ttl_seconds {} out of bounds [{MIN_TTL_SECONDS}, {MAX_TTL_SECONDS}]",
                self.ttl_seconds
            ));
        }
        if !(MIN_COHORT..=MAX_COHORT).contains(&self.cohort) {
            return Err(format!(
                "cohort {} out of bounds [{MIN_COHORT}, {MAX_COHORT}]",
                self.cohort
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            ttl_seconds: default_ttl_seconds(),
            cohort: default_cohort(),
        }
    }
}

/// A partial administrative update to the pool configuration.
///
/// Absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfigUpdate {
    /// New pool size, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<u32>,
    /// New reservation TTL, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// New cohort number, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort: Option<u32>,
}

impl PoolConfigUpdate {
    /// True when the update carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.pool_size.is_none() && self.ttl_seconds.is_none() && self.cohort.is_none()
    }
}

fn default_pool_size() -> u32 {
    10
}

fn default_ttl_seconds() -> u64 {
    86_400
}

fn default_cohort() -> u32 {
    1
}
