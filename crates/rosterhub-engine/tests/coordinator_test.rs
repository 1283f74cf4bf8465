//! End-to-end coordinator behavior over the in-memory storage adapter.

use std::sync::Arc;

use chrono::{Duration, Utc};

use rosterhub_core::config::{PoolConfig, PoolConfigUpdate};
use rosterhub_core::traits::clock::ManualClock;
use rosterhub_engine::coordinator::VerifyFailure;
use rosterhub_engine::{EngineError, ReservationCoordinator};
use rosterhub_storage::MemoryStorage;

/// Engine wired to an in-memory store and a manually advanced clock.
struct TestEngine {
    coordinator: ReservationCoordinator,
    clock: ManualClock,
    storage: Arc<MemoryStorage>,
}

async fn engine_with(defaults: PoolConfig) -> TestEngine {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let storage = Arc::new(MemoryStorage::new());
    let clock = ManualClock::new(Utc::now());
    let coordinator = ReservationCoordinator::new(
        storage.clone(),
        Arc::new(clock.clone()),
        defaults,
    )
    .await
    .expect("engine should start");

    TestEngine {
        coordinator,
        clock,
        storage,
    }
}

async fn engine() -> TestEngine {
    engine_with(PoolConfig {
        pool_size: 10,
        ttl_seconds: 86_400,
        cohort: 1,
    })
    .await
}

#[tokio::test]
async fn reserve_then_verify_ownership() {
    let t = engine().await;
    t.coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .expect("reserve should succeed");

    let same = t
        .coordinator
        .verify("5.10.001", Some("alice"), None)
        .await
        .unwrap();
    assert!(same.valid);
    assert_eq!(same.slot.as_deref(), Some("5.10.001"));

    let other = t
        .coordinator
        .verify("5.10.001", Some("mallory"), None)
        .await
        .unwrap();
    assert!(!other.valid);
    assert_eq!(other.reason, Some(VerifyFailure::LoginMismatch));
}

#[tokio::test]
async fn verify_by_user_id() {
    let t = engine().await;
    t.coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .unwrap();

    let same = t
        .coordinator
        .verify("5.10.001", None, Some("u1"))
        .await
        .unwrap();
    assert!(same.valid);

    // A user-id mismatch does not disclose the holder.
    let other = t
        .coordinator
        .verify("5.10.001", None, Some("u2"))
        .await
        .unwrap();
    assert_eq!(other.reason, Some(VerifyFailure::NotReserved));
}

#[tokio::test]
async fn verify_reasons() {
    let t = engine().await;

    let bad = t.coordinator.verify("nonsense", None, None).await.unwrap();
    assert_eq!(bad.reason, Some(VerifyFailure::InvalidSlotId));

    let empty = t.coordinator.verify("2.10.001", None, None).await.unwrap();
    assert_eq!(empty.reason, Some(VerifyFailure::NotReserved));

    t.coordinator
        .reserve("2.10.001", "u1", "alice")
        .await
        .unwrap();
    t.coordinator
        .submit("2.10.001", "@alice/Skill")
        .await
        .unwrap();
    let submitted = t.coordinator.verify("2.10.001", None, None).await.unwrap();
    assert_eq!(submitted.reason, Some(VerifyFailure::AlreadySubmitted));
}

#[tokio::test]
async fn second_reserve_returns_original_slot() {
    let t = engine().await;
    t.coordinator
        .reserve("3.10.001", "u1", "alice")
        .await
        .unwrap();

    let err = t
        .coordinator
        .reserve("4.10.001", "u1", "alice")
        .await
        .unwrap_err();
    match err {
        EngineError::UserHasReservation(slot) => assert_eq!(slot, "3.10.001"),
        other => panic!("expected UserHasReservation, got {other:?}"),
    }

    // The original reservation is untouched.
    assert_eq!(
        t.coordinator.lookup("u1").await.unwrap().as_deref(),
        Some("3.10.001")
    );
}

#[tokio::test]
async fn reserve_conflicts() {
    let t = engine().await;
    t.coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .unwrap();

    let err = t
        .coordinator
        .reserve("5.10.001", "u2", "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SlotTaken(_)));

    // Out-of-range position and wrong cohort are invalid slots.
    for bad in ["11.10.001", "0.10.001", "5.10.002", "garbage"] {
        let err = t.coordinator.reserve(bad, "u3", "carol").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSlot(_)), "{bad}");
    }
}

#[tokio::test]
async fn reserve_rejects_aliased_pool_size() {
    let t = engine().await;

    // "5.99.001" names position 5 under a pool-size component that does
    // not match the live config; accepting it would book the position
    // under a second key that status() never reports.
    let err = t
        .coordinator
        .reserve("5.99.001", "u1", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSlot(_)));

    // The canonical id is still free and books normally.
    t.coordinator
        .reserve("5.10.001", "u2", "bob")
        .await
        .unwrap();

    let report = t.coordinator.status(None).await.unwrap();
    assert_eq!(report.slots.len(), 10);
    assert!(!report.slots.contains_key("5.99.001"));

    let bad = t.coordinator.verify("5.99.001", None, None).await.unwrap();
    assert_eq!(bad.reason, Some(VerifyFailure::InvalidSlotId));
}

#[tokio::test]
async fn submit_is_idempotent_rejecting() {
    let t = engine().await;
    t.coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .unwrap();

    let submission = t
        .coordinator
        .submit("5.10.001", "@alice/Skill")
        .await
        .unwrap();
    assert_eq!(submission.user_id, "u1");
    assert_eq!(submission.skillset_ref, "@alice/Skill");

    t.clock.advance(Duration::days(60));
    let err = t
        .coordinator
        .submit("5.10.001", "@alice/Other")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadySubmitted(_)));
}

#[tokio::test]
async fn submit_never_reserved_slot() {
    let t = engine().await;
    let err = t
        .coordinator
        .submit("5.10.001", "@user/Skill")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotReserved(_)));
}

#[tokio::test]
async fn submit_past_expiry_is_authoritative() {
    let t = engine_with(PoolConfig {
        pool_size: 10,
        ttl_seconds: 60,
        cohort: 1,
    })
    .await;
    t.coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .unwrap();
    t.clock.advance(Duration::seconds(120));

    // The record still shows reserved and was not overwritten, so the
    // privileged caller may finalize it.
    let submission = t
        .coordinator
        .submit("5.10.001", "@alice/Skill")
        .await
        .unwrap();
    assert_eq!(submission.login, "alice");
}

#[tokio::test]
async fn release_lifecycle() {
    let t = engine().await;

    let err = t.coordinator.release("u1").await.unwrap_err();
    assert!(matches!(err, EngineError::NoReservation));

    t.coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .unwrap();
    let released = t.coordinator.release("u1").await.unwrap();
    assert_eq!(released, "5.10.001");
    assert_eq!(t.coordinator.lookup("u1").await.unwrap(), None);

    // The slot is reservable again, by anyone.
    t.coordinator
        .reserve("5.10.001", "u2", "bob")
        .await
        .unwrap();
}

#[tokio::test]
async fn release_after_expiry_reads_as_no_reservation() {
    let t = engine_with(PoolConfig {
        pool_size: 10,
        ttl_seconds: 1,
        cohort: 1,
    })
    .await;
    t.coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .unwrap();
    t.clock.advance(Duration::seconds(2));

    // lookup and release agree on the lapsed claim.
    assert_eq!(t.coordinator.lookup("u1").await.unwrap(), None);
    let err = t.coordinator.release("u1").await.unwrap_err();
    assert!(matches!(err, EngineError::NoReservation));

    // The leftovers were dropped, not just skipped.
    use rosterhub_core::traits::storage::StorageAdapter;
    assert_eq!(t.storage.get("rosterhub:user:u1").await.unwrap(), None);
    assert_eq!(
        t.storage.get("rosterhub:slot:5.10.001").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn release_after_submit() {
    let t = engine().await;
    t.coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .unwrap();

    // Submit normally removes the index entry; write a racing copy back
    // so release sees an entry pointing at a finalized record.
    t.coordinator
        .submit("5.10.001", "@alice/Skill")
        .await
        .unwrap();
    use rosterhub_core::traits::storage::StorageAdapter;
    t.storage
        .put("rosterhub:user:u1", "5.10.001")
        .await
        .unwrap();

    let err = t.coordinator.release("u1").await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadySubmitted(_)));
}

#[tokio::test]
async fn lazy_expiry_frees_the_slot() {
    let t = engine_with(PoolConfig {
        pool_size: 10,
        ttl_seconds: 1,
        cohort: 1,
    })
    .await;

    t.coordinator
        .reserve("3.10.001", "u1", "alice")
        .await
        .unwrap();
    t.clock.advance(Duration::seconds(2));

    // No intervening call has cleaned anything up; reads see availability.
    assert_eq!(t.coordinator.lookup("u1").await.unwrap(), None);
    let report = t.coordinator.status(None).await.unwrap();
    assert_eq!(
        report.slots["3.10.001"],
        rosterhub_engine::record::SlotState::Available
    );

    let granted = t
        .coordinator
        .reserve("3.10.001", "u2", "bob")
        .await
        .unwrap();
    assert_eq!(granted.slot, "3.10.001");

    // And u1, whose claim lapsed, may claim a fresh slot.
    t.coordinator
        .reserve("4.10.001", "u1", "alice")
        .await
        .unwrap();
}

#[tokio::test]
async fn status_reports_all_states() {
    let t = engine().await;
    t.coordinator
        .reserve("1.10.001", "u1", "alice")
        .await
        .unwrap();
    t.coordinator
        .reserve("2.10.001", "u2", "bob")
        .await
        .unwrap();
    t.coordinator
        .submit("2.10.001", "@bob/Skill")
        .await
        .unwrap();

    let report = t.coordinator.status(Some("u1")).await.unwrap();
    assert_eq!(report.cohort, 1);
    assert_eq!(report.pool_size, 10);
    assert_eq!(report.slots.len(), 10);
    assert_eq!(report.your_slot.as_deref(), Some("1.10.001"));

    use rosterhub_engine::record::SlotState;
    assert!(matches!(
        report.slots["1.10.001"],
        SlotState::Reserved { .. }
    ));
    assert_eq!(
        report.slots["2.10.001"],
        SlotState::Submitted {
            skillset_ref: "@bob/Skill".to_string()
        }
    );
    assert_eq!(report.slots["3.10.001"], SlotState::Available);
}

#[tokio::test]
async fn cohort_change_invalidates_reservations_but_keeps_submissions() {
    let t = engine().await;
    t.coordinator
        .reserve("1.10.001", "u1", "alice")
        .await
        .unwrap();
    t.coordinator
        .reserve("5.10.001", "u2", "bob")
        .await
        .unwrap();
    t.coordinator
        .submit("5.10.001", "@bob/Skill")
        .await
        .unwrap();

    t.coordinator
        .update_config(PoolConfigUpdate {
            cohort: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();

    // The old-cohort slot id is no longer addressable.
    let err = t
        .coordinator
        .reserve("1.10.001", "u3", "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSlot(_)));

    // u1's reservation was swept with its index entry.
    assert_eq!(t.coordinator.lookup("u1").await.unwrap(), None);
    assert!(matches!(
        t.coordinator.release("u1").await.unwrap_err(),
        EngineError::NoReservation
    ));

    // The finalized cohort-1 record remains permanently visible.
    let report = t.coordinator.status(None).await.unwrap();
    assert_eq!(report.cohort, 2);
    assert_eq!(
        report.slots["5.10.001"],
        rosterhub_engine::record::SlotState::Submitted {
            skillset_ref: "@bob/Skill".to_string()
        }
    );

    // And the freed user can claim a slot in the new cohort.
    t.coordinator
        .reserve("1.10.002", "u1", "alice")
        .await
        .unwrap();
}

#[tokio::test]
async fn submitted_user_cannot_retake_the_same_slot() {
    let t = engine().await;
    t.coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .unwrap();
    t.coordinator
        .submit("5.10.001", "@alice/Skill")
        .await
        .unwrap();

    // Submitted is terminal: the same slot can never be reserved again.
    let err = t
        .coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SlotTaken(_)));

    // Only a new cohort's slot is open to this user again.
    t.coordinator
        .update_config(PoolConfigUpdate {
            cohort: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    t.coordinator
        .reserve("5.10.002", "u1", "alice")
        .await
        .unwrap();
}

#[tokio::test]
async fn pool_size_change_requires_cohort_bump() {
    let t = engine().await;

    let err = t
        .coordinator
        .update_config(PoolConfigUpdate {
            pool_size: Some(20),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));

    let merged = t
        .coordinator
        .update_config(PoolConfigUpdate {
            pool_size: Some(20),
            cohort: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(merged.pool_size, 20);
    assert_eq!(merged.cohort, 2);
    assert_eq!(t.coordinator.status(None).await.unwrap().slots.len(), 20);
}

#[tokio::test]
async fn expired_reservation_scenario() {
    // reserve 3.10.001 for u1/alice with a 1s TTL; wait past it;
    // lookup(u1) → None; reserve by u2 → success.
    let t = engine_with(PoolConfig {
        pool_size: 10,
        ttl_seconds: 1,
        cohort: 1,
    })
    .await;

    t.coordinator
        .reserve("3.10.001", "u1", "alice")
        .await
        .unwrap();
    assert_eq!(
        t.coordinator.lookup("u1").await.unwrap().as_deref(),
        Some("3.10.001")
    );

    t.clock.advance(Duration::seconds(2));
    assert_eq!(t.coordinator.lookup("u1").await.unwrap(), None);

    let granted = t
        .coordinator
        .reserve("3.10.001", "u2", "bob")
        .await
        .unwrap();
    assert_eq!(granted.slot, "3.10.001");
}

#[tokio::test]
async fn lookup_returns_none_after_submit() {
    let t = engine().await;
    t.coordinator
        .reserve("5.10.001", "u1", "alice")
        .await
        .unwrap();
    t.coordinator
        .submit("5.10.001", "@alice/Skill")
        .await
        .unwrap();
    assert_eq!(t.coordinator.lookup("u1").await.unwrap(), None);
}

#[tokio::test]
async fn persisted_config_survives_restart() {
    let t = engine().await;
    t.coordinator
        .update_config(PoolConfigUpdate {
            pool_size: Some(20),
            cohort: Some(3),
            ..Default::default()
        })
        .await
        .unwrap();

    // A new coordinator over the same storage reads the persisted record,
    // not the bootstrap defaults.
    let restarted = ReservationCoordinator::new(
        t.storage.clone(),
        Arc::new(t.clock.clone()),
        PoolConfig {
            pool_size: 10,
            ttl_seconds: 86_400,
            cohort: 1,
        },
    )
    .await
    .unwrap();
    let config = restarted.config().await;
    assert_eq!(config.pool_size, 20);
    assert_eq!(config.cohort, 3);
}

#[tokio::test]
async fn reserve_normalizes_cohort_padding() {
    let t = engine().await;
    // Unpadded cohort parses to the same slot.
    let granted = t.coordinator.reserve("5.10.1", "u1", "alice").await.unwrap();
    assert_eq!(granted.slot, "5.10.001");

    let err = t
        .coordinator
        .reserve("5.10.001", "u2", "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SlotTaken(_)));
}
