//! In-memory reference implementation of the storage seam, backed by
//! `DashMap` with a separate insertion-order index so query results are
//! deterministic.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::entities::{
    Batch, LockStatus, MovementRecord, Reservation, ReservationStatus, Sku, StockLock,
};
use crate::errors::InventoryError;
use crate::store::{
    BatchMutation, BatchStore, LockStore, MovementLog, ReservationStore,
};

/// Thread-safe in-memory store implementing every storage trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: DashMap<String, Batch>,
    batch_order: Mutex<Vec<String>>,
    reservations: DashMap<Uuid, Reservation>,
    reservation_order: Mutex<Vec<Uuid>>,
    locks: DashMap<Uuid, StockLock>,
    lock_order: Mutex<Vec<Uuid>>,
    movements: Mutex<Vec<MovementRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn batch_numbers_in_order(&self) -> Vec<String> {
        self.batch_order
            .lock()
            .expect("batch order index poisoned")
            .clone()
    }

    fn batches_in_order(&self) -> Vec<Batch> {
        self.batch_numbers_in_order()
            .into_iter()
            .filter_map(|number| self.batches.get(&number).map(|b| b.clone()))
            .collect()
    }

    fn reservations_in_order(&self) -> Vec<Reservation> {
        let ids = self
            .reservation_order
            .lock()
            .expect("reservation order index poisoned")
            .clone();
        ids.into_iter()
            .filter_map(|id| self.reservations.get(&id).map(|r| r.clone()))
            .collect()
    }

    fn locks_in_order(&self) -> Vec<StockLock> {
        let ids = self
            .lock_order
            .lock()
            .expect("lock order index poisoned")
            .clone();
        ids.into_iter()
            .filter_map(|id| self.locks.get(&id).map(|l| l.clone()))
            .collect()
    }
}

#[async_trait]
impl BatchStore for MemoryStore {
    async fn insert_batch(&self, batch: Batch) -> Result<(), InventoryError> {
        let mut order = self.batch_order.lock().expect("batch order index poisoned");
        if self.batches.contains_key(&batch.batch_number) {
            return Err(InventoryError::DuplicateBatch(batch.batch_number));
        }
        order.push(batch.batch_number.clone());
        self.batches.insert(batch.batch_number.clone(), batch);
        Ok(())
    }

    async fn get_batch(&self, batch_number: &str) -> Result<Option<Batch>, InventoryError> {
        Ok(self.batches.get(batch_number).map(|b| b.clone()))
    }

    async fn find_by_sku(&self, sku: &Sku) -> Result<Vec<Batch>, InventoryError> {
        Ok(self
            .batches_in_order()
            .into_iter()
            .filter(|b| &b.sku == sku)
            .collect())
    }

    async fn find_available_by_sku(
        &self,
        sku: &Sku,
        location: Option<&str>,
    ) -> Result<Vec<Batch>, InventoryError> {
        Ok(self
            .batches_in_order()
            .into_iter()
            .filter(|b| {
                &b.sku == sku
                    && b.status.is_live()
                    && b.available_quantity > 0
                    && location
                        .map(|loc| b.location_id.as_deref() == Some(loc))
                        .unwrap_or(true)
            })
            .collect())
    }

    async fn find_expiring_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Batch>, InventoryError> {
        Ok(self
            .batches_in_order()
            .into_iter()
            .filter(|b| {
                b.expiry_date
                    .map(|exp| exp >= from && exp <= to)
                    .unwrap_or(false)
            })
            .collect())
    }

    async fn list_batches(&self) -> Result<Vec<Batch>, InventoryError> {
        Ok(self.batches_in_order())
    }

    async fn mutate_batch(
        &self,
        batch_number: &str,
        op: BatchMutation,
    ) -> Result<Batch, InventoryError> {
        let mut entry = self
            .batches
            .get_mut(batch_number)
            .ok_or_else(|| InventoryError::NotFound(format!("Batch {} not found", batch_number)))?;

        // Mutate a copy so a failing operation leaves the record untouched.
        let mut updated = entry.value().clone();
        op(&mut updated)?;
        updated.touch(Utc::now());
        debug_assert!(updated.counters_consistent());
        *entry.value_mut() = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), InventoryError> {
        let mut order = self
            .reservation_order
            .lock()
            .expect("reservation order index poisoned");
        order.push(reservation.id);
        self.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, InventoryError> {
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn find_reservations_by_business_id(
        &self,
        business_id: &str,
    ) -> Result<Vec<Reservation>, InventoryError> {
        Ok(self
            .reservations_in_order()
            .into_iter()
            .filter(|r| r.business_id == business_id)
            .collect())
    }

    async fn update_reservation(&self, reservation: Reservation) -> Result<(), InventoryError> {
        if !self.reservations.contains_key(&reservation.id) {
            return Err(InventoryError::NotFound(format!(
                "Reservation {} not found",
                reservation.id
            )));
        }
        self.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, InventoryError> {
        Ok(self
            .reservations_in_order()
            .into_iter()
            .filter(|r| r.status == ReservationStatus::Pending && r.expires_at < now)
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn insert_lock(&self, lock: StockLock) -> Result<(), InventoryError> {
        let mut order = self.lock_order.lock().expect("lock order index poisoned");
        order.push(lock.id);
        self.locks.insert(lock.id, lock);
        Ok(())
    }

    async fn get_lock(&self, id: Uuid) -> Result<Option<StockLock>, InventoryError> {
        Ok(self.locks.get(&id).map(|l| l.clone()))
    }

    async fn update_lock(&self, lock: StockLock) -> Result<(), InventoryError> {
        if !self.locks.contains_key(&lock.id) {
            return Err(InventoryError::NotFound(format!(
                "Lock {} not found",
                lock.id
            )));
        }
        self.locks.insert(lock.id, lock);
        Ok(())
    }

    async fn find_expired_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<StockLock>, InventoryError> {
        Ok(self
            .locks_in_order()
            .into_iter()
            .filter(|l| l.status == LockStatus::Active && l.is_expired(now))
            .collect())
    }
}

#[async_trait]
impl MovementLog for MemoryStore {
    async fn append_movement(&self, record: MovementRecord) -> Result<(), InventoryError> {
        self.movements
            .lock()
            .expect("movement log poisoned")
            .push(record);
        Ok(())
    }

    async fn find_movements_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Vec<MovementRecord>, InventoryError> {
        Ok(self
            .movements
            .lock()
            .expect("movement log poisoned")
            .iter()
            .filter(|m| m.reference_id == reference_id)
            .cloned()
            .collect())
    }
}
