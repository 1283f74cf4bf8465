//! Abstract interfaces consumed by the engine.

pub mod clock;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use storage::{StorageAdapter, WriteBatch};
