//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use batchstock::config::EngineConfig;
use batchstock::entities::{Batch, BatchStatus, QualityLevel, Sku};
use batchstock::events::Event;
use batchstock::store::{BatchStore, MemoryStore};
use batchstock::InventoryCore;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc::Receiver;

pub struct TestCore {
    pub core: InventoryCore<MemoryStore>,
    pub store: Arc<MemoryStore>,
    /// Kept alive so event sends never fail mid-test.
    pub events: Receiver<Event>,
}

pub fn test_core() -> TestCore {
    let store = Arc::new(MemoryStore::new());
    let (core, events) = InventoryCore::new(store.clone(), EngineConfig::default());
    TestCore {
        core,
        store,
        events,
    }
}

/// A plain available batch with `available = quantity` and default cost.
pub fn batch(number: &str, sku: &str, quantity: i64) -> Batch {
    let now = Utc::now();
    Batch {
        batch_number: number.into(),
        sku: Sku::new(sku),
        quantity,
        available_quantity: quantity,
        reserved_quantity: 0,
        locked_quantity: 0,
        unit_cost: Decimal::ONE,
        quality: QualityLevel::A,
        status: BatchStatus::Available,
        location_id: None,
        production_date: None,
        expiry_date: None,
        metadata: None,
        created_at: now,
        updated_at: now,
    }
}

/// A batch with an explicit creation date, for strategy-ordering tests.
pub fn batch_created(number: &str, sku: &str, quantity: i64, ymd: (i32, u32, u32)) -> Batch {
    let mut b = batch(number, sku, quantity);
    b.created_at = Utc
        .with_ymd_and_hms(ymd.0, ymd.1, ymd.2, 0, 0, 0)
        .unwrap();
    b
}

pub fn with_expiry(mut b: Batch, ymd: (i32, u32, u32)) -> Batch {
    b.expiry_date = NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2);
    b
}

pub fn with_location(mut b: Batch, location: &str) -> Batch {
    b.location_id = Some(location.into());
    b
}

pub fn with_cost(mut b: Batch, cost: Decimal) -> Batch {
    b.unit_cost = cost;
    b
}

pub async fn seed(store: &MemoryStore, b: Batch) {
    store.insert_batch(b).await.expect("seed batch");
}

pub async fn get(store: &MemoryStore, number: &str) -> Batch {
    store
        .get_batch(number)
        .await
        .expect("store read")
        .expect("batch exists")
}

/// Asserts the counter conservation invariant on one batch.
pub fn assert_counters(b: &Batch, quantity: i64, available: i64, reserved: i64, locked: i64) {
    assert_eq!(b.quantity, quantity, "quantity of {}", b.batch_number);
    assert_eq!(
        b.available_quantity, available,
        "available of {}",
        b.batch_number
    );
    assert_eq!(
        b.reserved_quantity, reserved,
        "reserved of {}",
        b.batch_number
    );
    assert_eq!(b.locked_quantity, locked, "locked of {}", b.batch_number);
    assert!(b.counters_consistent(), "counters of {}", b.batch_number);
}
