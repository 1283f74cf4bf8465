//! Storage key builders for all Rosterhub records.
//!
//! Centralising key construction prevents typos and makes it easy
//! to find every key the engine uses.

/// Prefix applied to all Rosterhub storage keys.
const PREFIX: &str = "rosterhub";

/// Key of the single persisted pool configuration record.
pub fn pool_config() -> String {
    format!("{PREFIX}:config")
}

/// Key of a slot record by slot id.
pub fn slot(slot_id: &str) -> String {
    format!("{PREFIX}:slot:{slot_id}")
}

/// Prefix under which every slot record lives, for `list` scans.
pub fn slot_prefix() -> String {
    format!("{PREFIX}:slot:")
}

/// Key of a user's reverse-index entry by external user id.
pub fn user(user_id: &str) -> String {
    format!("{PREFIX}:user:{user_id}")
}

/// Extract the slot id back out of a full slot-record key.
pub fn slot_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(PREFIX)
        .and_then(|rest| rest.strip_prefix(":slot:"))
}
