//! Engine operation errors.
//!
//! Denial outcomes form a small closed set; the external API layer maps
//! them to result codes through [`crate::response::ResponseShaper`].
//! Storage faults propagate transparently as [`AppError`] and are never
//! retried here: retrying a partially applied multi-key write could
//! double-apply a side effect.

use thiserror::Error;

use rosterhub_core::error::AppError;

/// A specialized `Result` type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Every way an engine operation can fail.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The slot id is malformed or not addressable under the current config.
    #[error("invalid slot id {0:?}")]
    InvalidSlot(String),

    /// The target slot is held by a live reservation or finalized.
    #[error("slot {0} is taken")]
    SlotTaken(String),

    /// The user already holds a live reservation on another slot.
    #[error("user already holds a reservation on slot {0}")]
    UserHasReservation(String),

    /// The slot record is already finalized.
    #[error("slot {0} has already been submitted")]
    AlreadySubmitted(String),

    /// No reserved record exists for the slot.
    #[error("slot {0} is not reserved")]
    NotReserved(String),

    /// The user holds no reservation.
    #[error("no reservation found for user")]
    NoReservation,

    /// A config update violated bounds or the cohort-scoping rule.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A storage-layer failure (I/O, malformed stored JSON).
    #[error(transparent)]
    Storage(#[from] AppError),
}

impl EngineError {
    /// True for denial outcomes scoped to the single call; false for
    /// storage faults.
    pub fn is_denial(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}
