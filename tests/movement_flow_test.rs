//! End-to-end movement flows: outbound with batch-level audit, inbound
//! receipt with weighted re-costing, inter-location transfer, and
//! operational locks.

mod common;

use assert_matches::assert_matches;
use batchstock::entities::{
    BatchStatus, LockLine, LockStatus, MovementDirection, MovementKind, RequestedLine, Sku,
};
use batchstock::errors::InventoryError;
use batchstock::services::{InboundLine, InboundRequest, LockRequest, OutboundRequest, TransferRequest};
use batchstock::store::MovementLog;
use chrono::{Duration, Utc};
use common::*;
use rust_decimal_macros::dec;

fn outbound(kind: MovementKind, reference: &str, sku: &str, quantity: i64) -> OutboundRequest {
    OutboundRequest {
        kind,
        reference_id: reference.into(),
        lines: vec![RequestedLine {
            sku: Sku::new(sku),
            quantity,
        }],
        strategy: None,
        location: None,
        operator: None,
        notes: None,
    }
}

fn inbound_line(sku: &str, batch_number: &str, quantity: i64, cost: rust_decimal::Decimal) -> InboundLine {
    InboundLine {
        sku: Sku::new(sku),
        batch_number: batch_number.into(),
        quantity,
        unit_cost: cost,
        quality: None,
        location_id: None,
        production_date: None,
        expiry_date: None,
    }
}

#[tokio::test]
async fn outbound_records_batch_level_allocations() {
    let t = test_core();
    seed(
        &t.store,
        with_cost(batch_created("A", "X", 6, (2024, 1, 1)), dec!(2)),
    )
    .await;
    seed(
        &t.store,
        with_cost(batch_created("B", "X", 9, (2024, 2, 1)), dec!(3)),
    )
    .await;

    let record = t
        .core
        .outbound
        .process(outbound(MovementKind::Sales, "SO-1", "X", 10))
        .await
        .unwrap();

    assert_eq!(record.direction, MovementDirection::Outbound);
    assert_eq!(record.total_quantity, 10);
    // 6 @ 2.00 from A plus 4 @ 3.00 from B.
    assert_eq!(record.total_cost, dec!(24));
    assert_eq!(record.allocated.len(), 2);
    assert_eq!(record.allocated[0].batch_number, "A");
    assert_eq!(record.allocated[0].quantity, 6);
    assert_eq!(record.allocated[1].batch_number, "B");
    assert_eq!(record.allocated[1].quantity, 4);

    assert_counters(&get(&t.store, "A").await, 0, 0, 0, 0);
    assert_counters(&get(&t.store, "B").await, 5, 5, 0, 0);

    let logged = t.store.find_movements_by_reference("SO-1").await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].id, record.id);
}

#[tokio::test]
async fn outbound_rejects_inbound_only_kinds() {
    let t = test_core();
    seed(&t.store, batch("A", "X", 10)).await;
    let err = t
        .core
        .outbound
        .process(outbound(MovementKind::Purchase, "SO-2", "X", 1))
        .await
        .unwrap_err();
    assert_matches!(err, InventoryError::InvalidArgument(_));
}

#[tokio::test]
async fn outbound_shortfall_leaves_no_movement_record() {
    let t = test_core();
    seed(&t.store, batch("A", "X", 3)).await;
    let err = t
        .core
        .outbound
        .process(outbound(MovementKind::Sales, "SO-3", "X", 5))
        .await
        .unwrap_err();
    assert_matches!(err, InventoryError::InsufficientStock { .. });

    assert_counters(&get(&t.store, "A").await, 3, 3, 0, 0);
    assert!(t
        .store
        .find_movements_by_reference("SO-3")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn outbound_with_several_lines_on_one_sku_fails_whole_when_short() {
    // A later line's shortfall must not leave earlier lines deducted
    // with no movement record.
    let t = test_core();
    seed(&t.store, batch("A", "X", 10)).await;
    seed(&t.store, batch("B", "X", 5)).await;

    let mut request = outbound(MovementKind::Sales, "SO-4", "X", 10);
    request.lines.push(RequestedLine {
        sku: Sku::new("X"),
        quantity: 8,
    });
    let err = t.core.outbound.process(request).await.unwrap_err();
    assert_matches!(
        err,
        InventoryError::InsufficientStock {
            requested: 18,
            available: 15
        }
    );

    assert_counters(&get(&t.store, "A").await, 10, 10, 0, 0);
    assert_counters(&get(&t.store, "B").await, 5, 5, 0, 0);
    assert!(t
        .store
        .find_movements_by_reference("SO-4")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn outbound_with_several_lines_on_one_sku_commits_when_stock_suffices() {
    let t = test_core();
    seed(&t.store, batch("A", "X", 10)).await;
    seed(&t.store, batch("B", "X", 5)).await;

    let mut request = outbound(MovementKind::Sales, "SO-5", "X", 6);
    request.lines.push(RequestedLine {
        sku: Sku::new("X"),
        quantity: 6,
    });
    let record = t.core.outbound.process(request).await.unwrap();
    assert_eq!(record.total_quantity, 12);
    assert_eq!(
        record.allocated.iter().map(|l| l.quantity).sum::<i64>(),
        12
    );

    let a = get(&t.store, "A").await;
    let b = get(&t.store, "B").await;
    assert_eq!(a.quantity + b.quantity, 3);
}

#[tokio::test]
async fn inbound_creates_unknown_batches_and_recosts_existing_ones() {
    let t = test_core();
    seed(&t.store, with_cost(batch("A", "X", 10), dec!(5))).await;

    let record = t
        .core
        .inbound
        .process(InboundRequest {
            kind: MovementKind::Purchase,
            reference_id: "PO-1".into(),
            lines: vec![
                inbound_line("X", "A", 20, dec!(8)),
                inbound_line("X", "NEW", 15, dec!(6)),
            ],
            operator: None,
            notes: None,
        })
        .await
        .unwrap();

    assert_eq!(record.direction, MovementDirection::Inbound);
    assert_eq!(record.total_quantity, 35);

    // Existing batch: 10 @ 5.00 + 20 @ 8.00 -> 30 @ 7.00.
    let topped_up = get(&t.store, "A").await;
    assert_counters(&topped_up, 30, 30, 0, 0);
    assert_eq!(topped_up.unit_cost, dec!(7));

    let created = get(&t.store, "NEW").await;
    assert_counters(&created, 15, 15, 0, 0);
    assert_eq!(created.unit_cost, dec!(6));
}

#[tokio::test]
async fn inbound_revives_a_depleted_batch() {
    let t = test_core();
    seed(&t.store, batch("A", "X", 5)).await;
    t.core.stock.deduct(&Sku::new("X"), 5).await.unwrap();

    t.core
        .inbound
        .process(InboundRequest {
            kind: MovementKind::Return,
            reference_id: "RMA-1".into(),
            lines: vec![inbound_line("X", "A", 2, dec!(1))],
            operator: None,
            notes: None,
        })
        .await
        .unwrap();

    let revived = get(&t.store, "A").await;
    assert_eq!(revived.status, BatchStatus::Available);
    assert_counters(&revived, 2, 2, 0, 0);
}

#[tokio::test]
async fn inbound_rejects_a_batch_number_owned_by_another_sku() {
    let t = test_core();
    seed(&t.store, batch("A", "X", 5)).await;
    let err = t
        .core
        .inbound
        .process(InboundRequest {
            kind: MovementKind::Purchase,
            reference_id: "PO-2".into(),
            lines: vec![inbound_line("Y", "A", 2, dec!(1))],
            operator: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, InventoryError::InvalidArgument(_));
}

#[tokio::test]
async fn transfer_conserves_quantity_across_locations() {
    let t = test_core();
    seed(
        &t.store,
        with_location(with_cost(batch("A", "X", 20), dec!(4)), "WH-1"),
    )
    .await;

    let record = t
        .core
        .transfers
        .process(TransferRequest {
            sku: Sku::new("X"),
            quantity: 8,
            from_location: "WH-1".into(),
            to_location: "WH-2".into(),
            reference_id: "TR-1".into(),
            strategy: None,
            operator: None,
            notes: None,
        })
        .await
        .unwrap();

    assert_eq!(record.kind, MovementKind::Transfer);
    assert_eq!(record.total_quantity, 8);

    let source = get(&t.store, "A").await;
    assert_counters(&source, 12, 12, 0, 0);

    let dest = get(&t.store, "A@WH-2").await;
    assert_counters(&dest, 8, 8, 0, 0);
    assert_eq!(dest.location_id.as_deref(), Some("WH-2"));
    assert_eq!(dest.unit_cost, dec!(4));
    assert_eq!(source.quantity + dest.quantity, 20);
}

#[tokio::test]
async fn repeated_transfers_accumulate_at_the_destination() {
    let t = test_core();
    seed(&t.store, with_location(batch("A", "X", 20), "WH-1")).await;

    for reference in ["TR-1", "TR-2"] {
        t.core
            .transfers
            .process(TransferRequest {
                sku: Sku::new("X"),
                quantity: 5,
                from_location: "WH-1".into(),
                to_location: "WH-2".into(),
                reference_id: reference.into(),
                strategy: None,
                operator: None,
                notes: None,
            })
            .await
            .unwrap();
    }

    assert_counters(&get(&t.store, "A").await, 10, 10, 0, 0);
    assert_counters(&get(&t.store, "A@WH-2").await, 10, 10, 0, 0);
}

#[tokio::test]
async fn transfer_to_the_same_location_is_rejected() {
    let t = test_core();
    seed(&t.store, with_location(batch("A", "X", 20), "WH-1")).await;
    let err = t
        .core
        .transfers
        .process(TransferRequest {
            sku: Sku::new("X"),
            quantity: 5,
            from_location: "WH-1".into(),
            to_location: "WH-1".into(),
            reference_id: "TR-3".into(),
            strategy: None,
            operator: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, InventoryError::InvalidArgument(_));
}

#[tokio::test]
async fn lock_lifecycle_moves_counters_and_is_idempotent_on_release() {
    let t = test_core();
    seed(&t.store, batch("A", "X", 10)).await;

    let lock = t
        .core
        .locks
        .lock_batches(LockRequest {
            lines: vec![LockLine {
                batch_number: "A".into(),
                quantity: 4,
            }],
            reason: "quality audit".into(),
            created_by: None,
            expires_at: None,
            metadata: None,
        })
        .await
        .unwrap();
    assert_eq!(lock.status, LockStatus::Active);
    assert_counters(&get(&t.store, "A").await, 10, 6, 0, 4);

    let released = t.core.locks.release_lock(lock.id).await.unwrap();
    assert_eq!(released.status, LockStatus::Released);
    assert_counters(&get(&t.store, "A").await, 10, 10, 0, 0);

    // Releasing again changes nothing.
    t.core.locks.release_lock(lock.id).await.unwrap();
    assert_counters(&get(&t.store, "A").await, 10, 10, 0, 0);
}

#[tokio::test]
async fn lock_request_fails_whole_when_one_line_is_short() {
    let t = test_core();
    seed(&t.store, batch("A", "X", 10)).await;
    seed(&t.store, batch("B", "Y", 2)).await;

    let err = t
        .core
        .locks
        .lock_batches(LockRequest {
            lines: vec![
                LockLine {
                    batch_number: "A".into(),
                    quantity: 4,
                },
                LockLine {
                    batch_number: "B".into(),
                    quantity: 5,
                },
            ],
            reason: "promotion hold".into(),
            created_by: None,
            expires_at: None,
            metadata: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, InventoryError::InsufficientStock { .. });
    assert_counters(&get(&t.store, "A").await, 10, 10, 0, 0);
    assert_counters(&get(&t.store, "B").await, 2, 2, 0, 0);
}

#[tokio::test]
async fn duplicate_lock_lines_are_validated_against_their_sum() {
    // Two lines on one batch must fit together, not just one at a time;
    // a midway failure would strand locked stock with no lock record.
    let t = test_core();
    seed(&t.store, batch("A", "X", 10)).await;

    let err = t
        .core
        .locks
        .lock_batches(LockRequest {
            lines: vec![
                LockLine {
                    batch_number: "A".into(),
                    quantity: 6,
                },
                LockLine {
                    batch_number: "A".into(),
                    quantity: 6,
                },
            ],
            reason: "inventory count".into(),
            created_by: None,
            expires_at: None,
            metadata: None,
        })
        .await
        .unwrap_err();
    assert_matches!(
        err,
        InventoryError::InsufficientStock {
            requested: 12,
            available: 10
        }
    );
    assert_counters(&get(&t.store, "A").await, 10, 10, 0, 0);
}

#[tokio::test]
async fn duplicate_lock_lines_that_fit_together_are_applied() {
    let t = test_core();
    seed(&t.store, batch("A", "X", 10)).await;

    let lock = t
        .core
        .locks
        .lock_batches(LockRequest {
            lines: vec![
                LockLine {
                    batch_number: "A".into(),
                    quantity: 4,
                },
                LockLine {
                    batch_number: "A".into(),
                    quantity: 3,
                },
            ],
            reason: "inventory count".into(),
            created_by: None,
            expires_at: None,
            metadata: None,
        })
        .await
        .unwrap();
    assert_eq!(lock.total_quantity(), 7);
    assert_counters(&get(&t.store, "A").await, 10, 3, 0, 7);
}

#[tokio::test]
async fn expired_lock_sweep_releases_overdue_locks() {
    let t = test_core();
    seed(&t.store, batch("A", "X", 10)).await;

    let overdue = t
        .core
        .locks
        .lock_batches(LockRequest {
            lines: vec![LockLine {
                batch_number: "A".into(),
                quantity: 3,
            }],
            reason: "maintenance".into(),
            created_by: None,
            expires_at: Some(Utc::now() - Duration::minutes(5)),
            metadata: None,
        })
        .await
        .unwrap();
    let open_ended = t
        .core
        .locks
        .lock_batches(LockRequest {
            lines: vec![LockLine {
                batch_number: "A".into(),
                quantity: 2,
            }],
            reason: "audit".into(),
            created_by: None,
            expires_at: None,
            metadata: None,
        })
        .await
        .unwrap();

    let processed = t.core.locks.release_expired_locks(Utc::now()).await.unwrap();
    assert_eq!(processed, 1);

    let swept = t.core.locks.get(overdue.id).await.unwrap().unwrap();
    assert_eq!(swept.status, LockStatus::Released);
    let kept = t.core.locks.get(open_ended.id).await.unwrap().unwrap();
    assert_eq!(kept.status, LockStatus::Active);
    assert_counters(&get(&t.store, "A").await, 10, 8, 0, 2);
}
