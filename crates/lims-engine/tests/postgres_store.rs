//! # PostgreSQL Store
//!
//! Executor runs against a live database: row locks serialise racing
//! callers, rejected moves leave no trace, a failed audit append rolls the
//! status write back, and stored chains verify after the JSONB round trip.
//!
//! Without DATABASE_URL every test returns early. Run them with:
//!   DATABASE_URL=postgres://... cargo test -p lims-engine --test postgres_store

use std::sync::Arc;

use lims_core::{EntityType, OrganizationId, UserId};
use lims_engine::{
    EngineError, EntityRecord, LifecycleStore, PgConfig, PgLifecycleStore, TransitionExecutor,
    TransitionRequest,
};
use lims_state::{ConflictKind, InvoiceStatus, OrderStatus, SampleStatus, Status, TestStatus};
use serde_json::json;
use tokio::sync::Barrier;

async fn store() -> Option<PgLifecycleStore> {
    let Ok(config) = PgConfig::from_env() else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL store test");
        return None;
    };
    Some(PgLifecycleStore::connect(&config).await.unwrap())
}

async fn test_in_progress(store: &PgLifecycleStore) -> EntityRecord {
    let test = store
        .create(EntityType::Test, OrganizationId::new(), None)
        .await
        .unwrap();
    let executor = TransitionExecutor::new(store.clone());
    for target in [TestStatus::Assigned, TestStatus::InProgress] {
        executor
            .execute_transition(TransitionRequest::new(test.key(), target))
            .await
            .unwrap();
    }
    test
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_completions_exactly_one_wins() {
    let Some(store) = store().await else { return };

    for _ in 0..10 {
        let test = test_in_progress(&store).await;
        let executor = TransitionExecutor::new(store.clone());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let executor = executor.clone();
                let barrier = Arc::clone(&barrier);
                let key = test.key();
                tokio::spawn(async move {
                    barrier.wait().await;
                    executor
                        .execute_transition(
                            TransitionRequest::new(key, TestStatus::Completed).by(UserId::new()),
                        )
                        .await
                })
            })
            .collect();

        let mut wins = 0;
        let mut losses = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(record) => {
                    assert_eq!(record.status, Status::Test(TestStatus::Completed));
                    wins += 1;
                }
                Err(err) => {
                    let conflict = err.as_conflict().unwrap();
                    assert_eq!(conflict.kind, ConflictKind::AlreadyInStatus);
                    assert_eq!(conflict.current, Status::Test(TestStatus::Completed));
                    losses += 1;
                }
            }
        }
        assert_eq!((wins, losses), (1, 1));

        let stored = store.find(test.key()).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Test(TestStatus::Completed));

        let log = store.audit_log_for(test.key()).await.unwrap();
        let completions: Vec<_> = log
            .iter()
            .filter(|entry| entry.record.new_status == Status::Test(TestStatus::Completed))
            .collect();
        assert_eq!(completions.len(), 1);
        assert_eq!(
            completions[0].record.previous_status,
            Status::Test(TestStatus::InProgress)
        );
        assert_eq!(log.len(), 3);
    }
}

#[tokio::test]
async fn illegal_target_leaves_row_and_audit_log_unchanged() {
    let Some(store) = store().await else { return };
    let sample = store
        .create(EntityType::Sample, OrganizationId::new(), None)
        .await
        .unwrap();
    let executor = TransitionExecutor::new(store.clone());
    executor
        .execute_transition(TransitionRequest::new(sample.key(), SampleStatus::Received))
        .await
        .unwrap();

    let row_before = store.find(sample.key()).await.unwrap().unwrap();
    let log_before = store.audit_log_for(sample.key()).await.unwrap();

    for target in [SampleStatus::Registered, SampleStatus::Disposed, SampleStatus::Received] {
        let err = executor
            .execute_transition(
                TransitionRequest::new(sample.key(), target)
                    .with_metadata(json!({"reason": "should not be stored"})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT", "{target:?}");
    }

    assert_eq!(store.find(sample.key()).await.unwrap().unwrap(), row_before);
    assert_eq!(store.audit_log_for(sample.key()).await.unwrap(), log_before);
}

#[tokio::test]
async fn failed_audit_append_rolls_back_status() {
    let Some(store) = store().await else { return };
    let order = store
        .create(EntityType::Order, OrganizationId::new(), None)
        .await
        .unwrap();

    // jsonb refuses the NUL escape, so the status update succeeds and the
    // audit insert after it fails inside the same transaction.
    let err = TransitionExecutor::new(store.clone())
        .execute_transition(
            TransitionRequest::new(order.key(), OrderStatus::Received)
                .with_metadata(json!({"note": "before\u{0}after"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)), "{err:?}");
    assert_eq!(err.code(), "STORAGE_ERROR");

    let stored = store.find(order.key()).await.unwrap().unwrap();
    assert_eq!(stored.status, order.status);
    assert_eq!(stored.updated_at, order.updated_at);
    assert!(store.audit_log_for(order.key()).await.unwrap().is_empty());
}

#[tokio::test]
async fn audit_chain_survives_jsonb_round_trip() {
    let Some(store) = store().await else { return };
    let invoice = store
        .create(EntityType::Invoice, OrganizationId::new(), None)
        .await
        .unwrap();
    let executor = TransitionExecutor::new(store.clone());
    let user = UserId::new();

    let steps = [
        (InvoiceStatus::Issued, json!({"zeta": 1, "alpha": "first", "nested": {"b": [3, 2, 1], "a": null}})),
        (InvoiceStatus::Sent, json!({"channel": "email", "recipients": ["billing@example.org"]})),
        (InvoiceStatus::PartiallyPaid, json!({"amountCents": 125000, "reference": "wire-7731"})),
    ];
    for (target, metadata) in steps.clone() {
        executor
            .execute_transition(
                TransitionRequest::new(invoice.key(), target)
                    .by(user)
                    .with_metadata(metadata),
            )
            .await
            .unwrap();
    }

    let log = store.audit_log_for(invoice.key()).await.unwrap();
    assert_eq!(log.len(), 3);
    for (entry, (target, metadata)) in log.iter().zip(steps) {
        assert_eq!(entry.record.new_status, Status::Invoice(target));
        assert_eq!(entry.record.metadata, Some(metadata));
        assert_eq!(entry.record.user_id, Some(user));
    }
    assert_eq!(log[1].previous_hash, log[0].record_hash);
    assert_eq!(log[2].previous_hash, log[1].record_hash);

    let integrity = store.verify_audit_chain(invoice.key()).await.unwrap();
    assert!(integrity.chain_valid, "{integrity:?}");
    assert_eq!(integrity.total_records, 3);
    assert_eq!(integrity.broken_links, 0);
}
