//! The reservation coordinator: the single-writer slot state machine.
//!
//! Every operation locks one Tokio mutex for its whole duration, storage
//! round trips included. That critical section is the actor-style
//! serialization guarantee: no two operations on the same pool ever
//! interleave, so multi-step read/check/write sequences stay atomic
//! without per-key locking. Multi-key writes additionally go through a
//! single [`WriteBatch`] commit so a crash between writes cannot split
//! the slot-record/user-index pair.
//!
//! Expiry is lazy: there are no background timers, only comparisons of a
//! stored `expires_at` against the injected clock at read time. Expired
//! records stay in storage until the next `reserve` overwrites them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use rosterhub_core::config::{PoolConfig, PoolConfigUpdate};
use rosterhub_core::error::AppError;
use rosterhub_core::result::AppResult;
use rosterhub_core::traits::clock::Clock;
use rosterhub_core::traits::storage::{StorageAdapter, WriteBatch};
use rosterhub_core::types::slot::SlotRef;

use crate::config_store::ConfigStore;
use crate::error::{EngineError, EngineResult};
use crate::keys;
use crate::record::{SlotRecord, SlotState};

/// A granted reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Canonical slot id.
    pub slot: String,
    /// Instant the claim lapses.
    pub expires_at: DateTime<Utc>,
}

/// The finalized record returned by `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Canonical slot id.
    pub slot: String,
    /// External user id of the holder.
    pub user_id: String,
    /// Login of the holder.
    pub login: String,
    /// External reference recorded at finalization.
    pub skillset_ref: String,
    /// Instant of finalization.
    pub submitted_at: DateTime<Utc>,
}

/// Full pool status as reported by `status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Current cohort number.
    pub cohort: u32,
    /// Current pool size.
    pub pool_size: u32,
    /// State of every valid slot under the current config, plus submitted
    /// records surviving from previous cohorts.
    pub slots: BTreeMap<String, SlotState>,
    /// The caller's live reservation, when a user id was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_slot: Option<String>,
}

/// Why a `verify` call judged the claim invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailure {
    /// Malformed slot id, or not addressable under the current config.
    InvalidSlotId,
    /// No record, or the reservation has expired.
    NotReserved,
    /// The slot is already finalized.
    AlreadySubmitted,
    /// The record's login differs from the supplied login.
    LoginMismatch,
}

/// Outcome of a `verify` call.
///
/// Serializes as `{valid: true, slot}` or `{valid: false, reason}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Whether a live reserved record matches the supplied identity.
    pub valid: bool,
    /// Canonical slot id, when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    /// Why the claim does not hold, when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerifyFailure>,
}

/// Mutable engine state owned by the coordinator's critical section.
#[derive(Debug)]
struct EngineState {
    /// The live pool configuration, mirrored from the persisted record.
    config: PoolConfig,
}

/// The single-writer reservation state machine.
///
/// One instance owns one slot pool. A deployment must route every call
/// for that pool to the same instance; the internal mutex serializes
/// only per instance.
#[derive(Debug)]
pub struct ReservationCoordinator {
    /// Durable key/value backend.
    storage: Arc<dyn StorageAdapter>,
    /// Time source for expiry comparisons.
    clock: Arc<dyn Clock>,
    /// Critical-section state; held across every whole operation.
    state: Mutex<EngineState>,
}

impl ReservationCoordinator {
    /// Build a coordinator, reading the persisted pool config or seeding
    /// it from `defaults` on first start.
    pub async fn new(
        storage: Arc<dyn StorageAdapter>,
        clock: Arc<dyn Clock>,
        defaults: PoolConfig,
    ) -> AppResult<Self> {
        let config = ConfigStore::new(Arc::clone(&storage))
            .load_or_init(defaults)
            .await?;
        info!(
            pool_size = config.pool_size,
            ttl_seconds = config.ttl_seconds,
            cohort = config.cohort,
            "Reservation coordinator ready"
        );
        Ok(Self {
            storage,
            clock,
            state: Mutex::new(EngineState { config }),
        })
    }

    /// Claim a slot for a user.
    ///
    /// Fails with [`EngineError::InvalidSlot`] for an unaddressable id,
    /// [`EngineError::UserHasReservation`] when the user already holds a
    /// live claim, and [`EngineError::SlotTaken`] when the slot is held
    /// or finalized. An expired prior record is simply overwritten.
    pub async fn reserve(
        &self,
        slot_id: &str,
        user_id: &str,
        login: &str,
    ) -> EngineResult<Reservation> {
        let state = self.state.lock().await;
        let config = state.config;
        let now = self.clock.now();

        let slot = parse_slot(slot_id)?;
        slot.validate(&config)
            .map_err(|_| EngineError::InvalidSlot(slot_id.to_string()))?;
        let canonical = slot.to_string();

        // One active claim per user. The index entry is authoritative only
        // while it points at a live record held by this user; anything else
        // (expired, finalized, overwritten by someone else) is stale and
        // gets replaced below.
        if let Some(held) = self.read_index(user_id).await? {
            match self.read_slot(&held).await? {
                Some(record) if record.is_live(now) && record.user_id() == user_id => {
                    return Err(EngineError::UserHasReservation(held));
                }
                _ => {
                    debug!(user = %user_id, held = %held, "Replacing stale user index entry");
                }
            }
        }

        match self.read_slot(&canonical).await? {
            Some(record) if record.is_live(now) || record.is_submitted() => {
                return Err(EngineError::SlotTaken(canonical));
            }
            _ => {}
        }

        let expires_at = now + Duration::seconds(config.ttl_seconds as i64);
        let record = SlotRecord::Reserved {
            user_id: user_id.to_string(),
            login: login.to_string(),
            expires_at,
        };

        let mut batch = WriteBatch::new();
        batch.put_json(keys::slot(&canonical), &record)?;
        batch.put(keys::user(user_id), &canonical);
        self.storage.commit(batch).await?;

        info!(slot = %canonical, user = %user_id, login = %login, %expires_at, "Slot reserved");
        Ok(Reservation {
            slot: canonical,
            expires_at,
        })
    }

    /// Release the caller's current reservation, returning the freed slot id.
    ///
    /// Only a live claim can be released. An expired record reads as no
    /// reservation, same as `lookup`; its leftovers are dropped on the way.
    pub async fn release(&self, user_id: &str) -> EngineResult<String> {
        let _state = self.state.lock().await;
        let now = self.clock.now();

        let held = self
            .read_index(user_id)
            .await?
            .ok_or(EngineError::NoReservation)?;

        match self.read_slot(&held).await? {
            None => {
                // Dangling index entry; drop it so the user is not wedged.
                warn!(user = %user_id, held = %held, "Dropping dangling user index entry");
                self.storage.delete(&keys::user(user_id)).await?;
                Err(EngineError::NoReservation)
            }
            Some(record) if record.is_submitted() => {
                // The record is authoritative over the index: a finalized
                // slot can never be released.
                Err(EngineError::AlreadySubmitted(held))
            }
            Some(record) if record.user_id() != user_id => {
                // The user's claim lapsed and someone else re-reserved the
                // slot; only the stale index entry is ours to remove.
                warn!(user = %user_id, held = %held, "Index points at a slot held by another user");
                self.storage.delete(&keys::user(user_id)).await?;
                Err(EngineError::NoReservation)
            }
            Some(record) if !record.is_live(now) => {
                // Expired claims read as absent everywhere; clear the
                // record and index together.
                debug!(user = %user_id, held = %held, "Dropping expired reservation on release");
                let mut batch = WriteBatch::new();
                batch.delete(keys::slot(&held)).delete(keys::user(user_id));
                self.storage.commit(batch).await?;
                Err(EngineError::NoReservation)
            }
            Some(_) => {
                let mut batch = WriteBatch::new();
                batch.delete(keys::slot(&held)).delete(keys::user(user_id));
                self.storage.commit(batch).await?;
                info!(slot = %held, user = %user_id, "Slot released");
                Ok(held)
            }
        }
    }

    /// Finalize a reserved slot into a permanent record.
    ///
    /// Trusted-caller operation: the engine performs no authorization.
    /// Finalization is authoritative and does not re-check the TTL: a
    /// record still showing `reserved` may be submitted past expiry.
    pub async fn submit(&self, slot_id: &str, skillset_ref: &str) -> EngineResult<Submission> {
        let _state = self.state.lock().await;
        let now = self.clock.now();

        // No format pre-check: an unparseable id simply misses the lookup.
        let canonical = slot_id
            .parse::<SlotRef>()
            .map(|s| s.to_string())
            .unwrap_or_else(|_| slot_id.to_string());

        match self.read_slot(&canonical).await? {
            None => Err(EngineError::NotReserved(canonical)),
            Some(record) if record.is_submitted() => Err(EngineError::AlreadySubmitted(canonical)),
            Some(record) => {
                let user_id = record.user_id().to_string();
                let login = record.login().to_string();
                let finalized = SlotRecord::Submitted {
                    user_id: user_id.clone(),
                    login: login.clone(),
                    skillset_ref: skillset_ref.to_string(),
                    submitted_at: now,
                };

                let mut batch = WriteBatch::new();
                batch.put_json(keys::slot(&canonical), &finalized)?;
                // Drop the index entry only if it still points here; the
                // user may have moved on to a fresh reservation since the
                // old one expired.
                if self.read_index(&user_id).await?.as_deref() == Some(canonical.as_str()) {
                    batch.delete(keys::user(&user_id));
                }
                self.storage.commit(batch).await?;

                info!(slot = %canonical, user = %user_id, skillset_ref = %skillset_ref, "Slot submitted");
                Ok(Submission {
                    slot: canonical,
                    user_id,
                    login,
                    skillset_ref: skillset_ref.to_string(),
                    submitted_at: now,
                })
            }
        }
    }

    /// Read-only full pool status.
    ///
    /// Maps every valid slot id under the current config to its state,
    /// plus submitted records surviving from previous cohorts (finalized
    /// history never disappears). Nothing is written: expired records
    /// simply read as available.
    pub async fn status(&self, user_id: Option<&str>) -> EngineResult<StatusReport> {
        let state = self.state.lock().await;
        let config = state.config;
        let now = self.clock.now();

        let mut slots: BTreeMap<String, SlotState> = BTreeMap::new();
        for position in 1..=config.pool_size {
            let id = SlotRef::new(position, config.pool_size, config.cohort).to_string();
            slots.insert(id, SlotState::Available);
        }

        for (key, value) in self.storage.list(&keys::slot_prefix()).await? {
            let Some(slot_id) = keys::slot_id_from_key(&key) else {
                continue;
            };
            let record: SlotRecord = serde_json::from_str(&value).map_err(AppError::from)?;
            match record {
                SlotRecord::Submitted { skillset_ref, .. } => {
                    // Included even when the id is no longer addressable
                    // under the current config.
                    slots.insert(slot_id.to_string(), SlotState::Submitted { skillset_ref });
                }
                SlotRecord::Reserved { expires_at, .. } if expires_at > now => {
                    // Only current-config ids were seeded; a stray reserved
                    // record from an old cohort is not reported.
                    if let Some(entry) = slots.get_mut(slot_id) {
                        *entry = SlotState::Reserved { expires_at };
                    }
                }
                SlotRecord::Reserved { .. } => {} // expired: reads as available
            }
        }

        let your_slot = match user_id {
            Some(user_id) => self.lookup_inner(user_id, now).await?,
            None => None,
        };

        Ok(StatusReport {
            cohort: config.cohort,
            pool_size: config.pool_size,
            slots,
            your_slot,
        })
    }

    /// Read-only ownership/validity check. Never mutates.
    pub async fn verify(
        &self,
        slot_id: &str,
        login: Option<&str>,
        user_id: Option<&str>,
    ) -> EngineResult<Verification> {
        let state = self.state.lock().await;
        let config = state.config;
        let now = self.clock.now();

        let slot = match slot_id.parse::<SlotRef>() {
            Ok(slot) if slot.validate(&config).is_ok() => slot,
            _ => return Ok(Verification::invalid(VerifyFailure::InvalidSlotId)),
        };
        let canonical = slot.to_string();

        let record = match self.read_slot(&canonical).await? {
            None => return Ok(Verification::invalid(VerifyFailure::NotReserved)),
            Some(record) => record,
        };

        if record.is_submitted() {
            return Ok(Verification::invalid(VerifyFailure::AlreadySubmitted));
        }
        if !record.is_live(now) {
            return Ok(Verification::invalid(VerifyFailure::NotReserved));
        }
        if let Some(user_id) = user_id {
            // A user-id mismatch reads as not-reserved rather than
            // disclosing that the slot is held by someone else.
            if record.user_id() != user_id {
                return Ok(Verification::invalid(VerifyFailure::NotReserved));
            }
        }
        if let Some(login) = login {
            if record.login() != login {
                return Ok(Verification::invalid(VerifyFailure::LoginMismatch));
            }
        }

        Ok(Verification::valid(canonical))
    }

    /// Reverse lookup: the user's current slot id, only while it is still
    /// reserved and unexpired. `None` for submitted, expired, or absent.
    pub async fn lookup(&self, user_id: &str) -> EngineResult<Option<String>> {
        let _state = self.state.lock().await;
        let now = self.clock.now();
        self.lookup_inner(user_id, now).await
    }

    /// Apply an administrative config update.
    ///
    /// A cohort change sweeps every reserved record and its index entry
    /// (reservations never carry across cohorts); submitted records are
    /// never touched. The sweep and the new config record commit as one
    /// batch.
    pub async fn update_config(&self, update: PoolConfigUpdate) -> EngineResult<PoolConfig> {
        let mut state = self.state.lock().await;
        let current = state.config;
        let merged = ConfigStore::apply_update(&current, &update)?;

        let mut batch = WriteBatch::new();
        let mut swept = 0usize;
        if merged.cohort != current.cohort {
            for (key, value) in self.storage.list(&keys::slot_prefix()).await? {
                let record: SlotRecord = serde_json::from_str(&value).map_err(AppError::from)?;
                if let SlotRecord::Reserved { user_id, .. } = record {
                    batch.delete(key).delete(keys::user(&user_id));
                    swept += 1;
                }
            }
        }
        batch.put_json(keys::pool_config(), &merged)?;
        self.storage.commit(batch).await?;
        state.config = merged;

        info!(
            pool_size = merged.pool_size,
            ttl_seconds = merged.ttl_seconds,
            cohort = merged.cohort,
            swept,
            "Pool config updated"
        );
        Ok(merged)
    }

    /// The live pool configuration.
    pub async fn config(&self) -> PoolConfig {
        self.state.lock().await.config
    }

    // ── Internal reads (caller must hold the state lock) ──────────

    async fn lookup_inner(&self, user_id: &str, now: DateTime<Utc>) -> EngineResult<Option<String>> {
        let Some(held) = self.read_index(user_id).await? else {
            return Ok(None);
        };
        match self.read_slot(&held).await? {
            Some(record) if record.is_live(now) && record.user_id() == user_id => Ok(Some(held)),
            _ => Ok(None),
        }
    }

    async fn read_slot(&self, slot_id: &str) -> AppResult<Option<SlotRecord>> {
        match self.storage.get(&keys::slot(slot_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn read_index(&self, user_id: &str) -> AppResult<Option<String>> {
        self.storage.get(&keys::user(user_id)).await
    }
}

impl Verification {
    /// A valid outcome carrying the canonical slot id.
    pub fn valid(slot: impl Into<String>) -> Self {
        Self {
            valid: true,
            slot: Some(slot.into()),
            reason: None,
        }
    }

    /// An invalid outcome carrying the failure reason.
    pub fn invalid(reason: VerifyFailure) -> Self {
        Self {
            valid: false,
            slot: None,
            reason: Some(reason),
        }
    }
}

/// Parse a slot id, mapping failure to the engine's invalid-slot denial.
fn parse_slot(slot_id: &str) -> EngineResult<SlotRef> {
    slot_id
        .parse::<SlotRef>()
        .map_err(|_| EngineError::InvalidSlot(slot_id.to_string()))
}
