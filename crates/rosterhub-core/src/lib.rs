//! # rosterhub-core
//!
//! Core crate for Rosterhub. Contains traits, configuration schemas,
//! the slot reference type, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Rosterhub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
pub use types::slot::SlotRef;
