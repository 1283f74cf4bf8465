//! Slot reference parsing and validation.
//!
//! A slot is addressed by a three-part dotted string encoding its position,
//! the pool size it was minted under, and the cohort number, e.g. `5.10.001`.
//! The cohort component is rendered zero-padded to three digits; parsing
//! accepts any decimal width.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::PoolConfig;
use crate::error::AppError;
use crate::result::AppResult;

/// A parsed slot reference: `(position, pool_size, cohort)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    /// 1-based position of the slot within its pool.
    pub position: u32,
    /// Pool size the slot was minted under.
    pub pool_size: u32,
    /// Cohort number the slot belongs to.
    pub cohort: u32,
}

impl SlotRef {
    /// Create a slot reference from its components.
    pub fn new(position: u32, pool_size: u32, cohort: u32) -> Self {
        Self {
            position,
            pool_size,
            cohort,
        }
    }

    /// Check that this slot is addressable under the given pool config.
    ///
    /// All three components must agree with the current config: the
    /// position must fall within the pool, and the pool-size and cohort
    /// components must match exactly. The full dotted string is the
    /// storage key, so a mismatched component would alias the same
    /// position under a second key. Failure is a not-found condition:
    /// the caller asked for a slot that does not exist right now.
    pub fn validate(&self, config: &PoolConfig) -> AppResult<()> {
        if self.position < 1 || self.position > config.pool_size {
            return Err(AppError::not_found(format!(
                "slot position {} is outside pool 1..={}",
                self.position, config.pool_size
            )));
        }
        if self.pool_size != config.pool_size {
            return Err(AppError::not_found(format!(
                "slot pool size {} does not match current pool size {}",
                self.pool_size, config.pool_size
            )));
        }
        if self.cohort != config.cohort {
            return Err(AppError::not_found(format!(
                "slot cohort {} does not match current cohort {}",
                self.cohort, config.cohort
            )));
        }
        Ok(())
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{:03}", self.position, self.pool_size, self.cohort)
    }
}

/// Error returned when a slot reference string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid slot id: {0:?}")]
pub struct ParseSlotError(pub String);

impl FromStr for SlotRef {
    type Err = ParseSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (a, b, c) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c), None) => (a, b, c),
            _ => return Err(ParseSlotError(s.to_string())),
        };
        let parse = |p: &str| -> Result<u32, ParseSlotError> {
            p.parse::<u32>().map_err(|_| ParseSlotError(s.to_string()))
        };
        Ok(Self {
            position: parse(a)?,
            pool_size: parse(b)?,
            cohort: parse(c)?,
        })
    }
}
