//! Shared domain types.

pub mod slot;
