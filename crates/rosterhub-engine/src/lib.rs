//! # rosterhub-engine
//!
//! The Rosterhub reservation coordination engine: a single-writer state
//! machine that owns slot lifecycle (available → reserved → submitted),
//! enforces one active claim per user, expires reservations lazily at
//! read time, and supports administrative re-sizing/versioning of the
//! slot pool without losing finalized records.
//!
//! The engine performs no network I/O and no authentication; an external
//! request-handling layer calls the [`coordinator::ReservationCoordinator`]
//! operations and passes the shaped results through.

pub mod config_store;
pub mod coordinator;
pub mod error;
pub mod keys;
pub mod record;
pub mod response;

pub use coordinator::ReservationCoordinator;
pub use error::{EngineError, EngineResult};
pub use response::{ResponseShaper, ShapedResponse};
