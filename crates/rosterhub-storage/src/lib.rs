//! # rosterhub-storage
//!
//! Storage adapter implementations for the Rosterhub engine: an in-memory
//! map for tests and single-process deployments, and a Redis-backed
//! adapter behind the `redis-backend` feature.

pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use memory::MemoryStorage;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisStorage;
