//! Storage seam for the inventory core.
//!
//! Persistence mechanics live behind these traits; the engine only relies
//! on keyed lookup, filtered queries, and per-batch atomic
//! read-modify-write. All counter mutation in the crate is routed through
//! [`BatchStore::mutate_batch`] so concurrency control has a single seam.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::entities::{Batch, MovementRecord, Reservation, Sku, StockLock};
use crate::errors::InventoryError;

pub mod memory;

pub use memory::MemoryStore;

/// An all-or-nothing mutation applied to one batch under the store's
/// per-batch atomic section. Returning an error leaves the batch untouched.
pub type BatchMutation = Box<dyn FnOnce(&mut Batch) -> Result<(), InventoryError> + Send>;

/// Durable keyed storage for batches.
///
/// Query results are returned in storage (insertion) order, which the
/// stock operator depends on for its batch walk.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Fails with `DuplicateBatch` on a batch-number collision.
    async fn insert_batch(&self, batch: Batch) -> Result<(), InventoryError>;

    async fn get_batch(&self, batch_number: &str) -> Result<Option<Batch>, InventoryError>;

    /// All batches of a SKU regardless of status, storage order.
    async fn find_by_sku(&self, sku: &Sku) -> Result<Vec<Batch>, InventoryError>;

    /// Live batches of a SKU with `available_quantity > 0`, optionally
    /// filtered by location.
    async fn find_available_by_sku(
        &self,
        sku: &Sku,
        location: Option<&str>,
    ) -> Result<Vec<Batch>, InventoryError>;

    /// Batches with a concrete expiry date inside the window. Batches
    /// without an expiry never appear here.
    async fn find_expiring_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Batch>, InventoryError>;

    async fn list_batches(&self) -> Result<Vec<Batch>, InventoryError>;

    /// Applies an all-or-nothing mutation to one batch and returns the
    /// updated record. Fails with `NotFound` for an unknown batch number.
    async fn mutate_batch(
        &self,
        batch_number: &str,
        op: BatchMutation,
    ) -> Result<Batch, InventoryError>;
}

/// Storage for reservation records.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), InventoryError>;

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, InventoryError>;

    async fn find_reservations_by_business_id(
        &self,
        business_id: &str,
    ) -> Result<Vec<Reservation>, InventoryError>;

    async fn update_reservation(&self, reservation: Reservation) -> Result<(), InventoryError>;

    /// Pending reservations whose expiry has passed, up to `limit`,
    /// storage order.
    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, InventoryError>;
}

/// Storage for operational locks.
#[async_trait]
pub trait LockStore: Send + Sync {
    async fn insert_lock(&self, lock: StockLock) -> Result<(), InventoryError>;

    async fn get_lock(&self, id: Uuid) -> Result<Option<StockLock>, InventoryError>;

    async fn update_lock(&self, lock: StockLock) -> Result<(), InventoryError>;

    /// Active locks with an expiry in the past, storage order.
    async fn find_expired_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<StockLock>, InventoryError>;
}

/// Append-only audit log of stock movements.
#[async_trait]
pub trait MovementLog: Send + Sync {
    async fn append_movement(&self, record: MovementRecord) -> Result<(), InventoryError>;

    async fn find_movements_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Vec<MovementRecord>, InventoryError>;
}

/// Convenience bound for services needing the full storage surface.
pub trait InventoryStore: BatchStore + ReservationStore + LockStore + MovementLog {}

impl<T: BatchStore + ReservationStore + LockStore + MovementLog> InventoryStore for T {}
