//! Persisted slot records and the read-side slot states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted slot record.
///
/// Absence of a record means the slot is available. A `Reserved` record
/// whose `expires_at` has passed also reads as available; nothing rewrites
/// it until the next `reserve` overwrites it. `Submitted` is terminal and
/// never transitions further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotRecord {
    /// A live or expired claim on the slot.
    Reserved {
        /// External user id of the holder.
        user_id: String,
        /// Verified login of the holder.
        login: String,
        /// Instant the claim lapses.
        expires_at: DateTime<Utc>,
    },
    /// The finalized, permanent record.
    Submitted {
        /// External user id of the holder at finalization.
        user_id: String,
        /// Verified login of the holder at finalization.
        login: String,
        /// External reference recorded at finalization, e.g. `@user/Skill`.
        skillset_ref: String,
        /// Instant of finalization.
        submitted_at: DateTime<Utc>,
    },
}

impl SlotRecord {
    /// External user id of the record's holder.
    pub fn user_id(&self) -> &str {
        match self {
            Self::Reserved { user_id, .. } | Self::Submitted { user_id, .. } => user_id,
        }
    }

    /// Login of the record's holder.
    pub fn login(&self) -> &str {
        match self {
            Self::Reserved { login, .. } | Self::Submitted { login, .. } => login,
        }
    }

    /// True for a `Reserved` record whose TTL has lapsed. Submitted
    /// records never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Reserved { expires_at, .. } => *expires_at <= now,
            Self::Submitted { .. } => false,
        }
    }

    /// True for a `Reserved` record that is still within its TTL.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        matches!(self, Self::Reserved { .. }) && !self.is_expired(now)
    }

    /// True for a `Submitted` record.
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }
}

/// The read-side state of one slot, as reported by `status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotState {
    /// No live claim; the slot can be reserved.
    Available,
    /// A live claim holds the slot until `expires_at`.
    Reserved {
        /// Instant the claim lapses.
        expires_at: DateTime<Utc>,
    },
    /// The slot is finalized permanently.
    Submitted {
        /// External reference recorded at finalization.
        skillset_ref: String,
    },
}
