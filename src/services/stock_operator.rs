//! Low-level counter mutation.
//!
//! The operator walks batches in storage order (not allocation-strategy
//! order); these are system-internal operations rather than customer-facing
//! allocations. Every mutation goes through the store's per-batch atomic
//! section and re-validates sufficiency at apply time, so a plan that went
//! stale fails with `InsufficientStock` instead of driving a counter
//! negative. Cross-batch operations validate totals up front, but a
//! concurrent writer can still interleave between batches; a mid-walk
//! failure leaves the earlier per-batch mutations applied and reports the
//! shortfall to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::entities::{LockLine, ReservationLine, Sku};
use crate::errors::InventoryError;
use crate::store::BatchStore;

/// Applies lock/unlock/deduct/restock/put mutations to the batches of one
/// SKU, and frozen-plan mutations for the reservation and lock engines.
pub struct StockOperator<S> {
    store: Arc<S>,
}

impl<S> Clone for StockOperator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: BatchStore> StockOperator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Moves `quantity` units from available to locked across the SKU's
    /// batches. Fails with `InsufficientStock` when the total available is
    /// short. Returns the per-batch lock lines actually applied.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn lock(&self, sku: &Sku, quantity: i64) -> Result<Vec<LockLine>, InventoryError> {
        self.require_positive(quantity)?;
        let candidates = self.store.find_available_by_sku(sku, None).await?;
        let total: i64 = candidates.iter().map(|b| b.available_quantity).sum();
        if total < quantity {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available: total,
            });
        }

        let mut remaining = quantity;
        let mut lines = Vec::new();
        for batch in &candidates {
            if remaining == 0 {
                break;
            }
            let taken = self
                .take_counter(&batch.batch_number, remaining, CounterMove::AvailableToLocked)
                .await?;
            if taken > 0 {
                lines.push(LockLine {
                    batch_number: batch.batch_number.clone(),
                    quantity: taken,
                });
                remaining -= taken;
            }
        }
        if remaining > 0 {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available: quantity - remaining,
            });
        }

        info!(quantity, batches = lines.len(), "Stock locked");
        Ok(lines)
    }

    /// Releases up to `quantity` locked units back to available, walking
    /// every batch of the SKU. Unlocking more than is locked simply
    /// unlocks what exists; returns the quantity actually released.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn unlock(&self, sku: &Sku, quantity: i64) -> Result<i64, InventoryError> {
        self.require_positive(quantity)?;
        let batches = self.store.find_by_sku(sku).await?;

        let mut remaining = quantity;
        for batch in &batches {
            if remaining == 0 {
                break;
            }
            let released = self
                .take_counter(&batch.batch_number, remaining, CounterMove::LockedToAvailable)
                .await?;
            remaining -= released;
        }

        let released = quantity - remaining;
        info!(requested = quantity, released, "Stock unlocked");
        Ok(released)
    }

    /// Permanently consumes `quantity` units: both total and available
    /// drop, batches depleting along the way. Fails with
    /// `InsufficientStock` when the total available is short. Returns the
    /// per-batch quantities deducted.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn deduct(&self, sku: &Sku, quantity: i64) -> Result<Vec<LockLine>, InventoryError> {
        self.require_positive(quantity)?;
        let candidates = self.store.find_available_by_sku(sku, None).await?;
        let total: i64 = candidates.iter().map(|b| b.available_quantity).sum();
        if total < quantity {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available: total,
            });
        }

        let mut remaining = quantity;
        let mut lines = Vec::new();
        for batch in &candidates {
            if remaining == 0 {
                break;
            }
            let taken = self
                .take_counter(&batch.batch_number, remaining, CounterMove::Consume)
                .await?;
            if taken > 0 {
                lines.push(LockLine {
                    batch_number: batch.batch_number.clone(),
                    quantity: taken,
                });
                remaining -= taken;
            }
        }
        if remaining > 0 {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available: quantity - remaining,
            });
        }

        info!(quantity, batches = lines.len(), "Stock deducted");
        Ok(lines)
    }

    /// Adds `quantity` units onto the last batch of the SKU: the
    /// append-only restock target for returns, not a strategy-driven
    /// choice.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn restock(&self, sku: &Sku, quantity: i64) -> Result<String, InventoryError> {
        self.require_positive(quantity)?;
        let batches = self.store.find_by_sku(sku).await?;
        let target = batches
            .last()
            .ok_or_else(|| InventoryError::NotFound(format!("No batches exist for SKU {}", sku)))?
            .batch_number
            .clone();
        self.add_stock(&target, quantity).await?;
        Ok(target)
    }

    /// Adds `quantity` units onto the first batch of the SKU; the
    /// symmetric counterpart to `restock` for simple inbound flows without
    /// batch-level cost tracking.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn put(&self, sku: &Sku, quantity: i64) -> Result<String, InventoryError> {
        self.require_positive(quantity)?;
        let batches = self.store.find_by_sku(sku).await?;
        let target = batches
            .first()
            .ok_or_else(|| InventoryError::NotFound(format!("No batches exist for SKU {}", sku)))?
            .batch_number
            .clone();
        self.add_stock(&target, quantity).await?;
        Ok(target)
    }

    /// Mirrors a frozen reservation plan into the batch counters:
    /// `available -= q`, `reserved += q` per line.
    pub async fn apply_reserve(&self, lines: &[ReservationLine]) -> Result<(), InventoryError> {
        for line in lines {
            let q = line.quantity;
            self.store
                .mutate_batch(
                    &line.batch_number,
                    Box::new(move |b| {
                        if b.available_quantity < q {
                            return Err(InventoryError::InsufficientStock {
                                requested: q,
                                available: b.available_quantity,
                            });
                        }
                        b.available_quantity -= q;
                        b.reserved_quantity += q;
                        Ok(())
                    }),
                )
                .await?;
        }
        Ok(())
    }

    /// Consumes a frozen plan: `quantity -= q`, `reserved -= q` per line.
    /// Available stays where the reserve left it.
    pub async fn apply_confirm(&self, lines: &[ReservationLine]) -> Result<(), InventoryError> {
        for line in lines {
            let q = line.quantity;
            self.store
                .mutate_batch(
                    &line.batch_number,
                    Box::new(move |b| {
                        if b.reserved_quantity < q {
                            return Err(InventoryError::InvalidState(format!(
                                "Batch {} holds {} reserved units, cannot confirm {}",
                                b.batch_number, b.reserved_quantity, q
                            )));
                        }
                        b.quantity -= q;
                        b.reserved_quantity -= q;
                        b.refresh_depletion();
                        Ok(())
                    }),
                )
                .await?;
        }
        Ok(())
    }

    /// Returns a frozen plan to the pool: `reserved -= q`,
    /// `available += q` per line.
    pub async fn apply_release(&self, lines: &[ReservationLine]) -> Result<(), InventoryError> {
        for line in lines {
            let q = line.quantity;
            self.store
                .mutate_batch(
                    &line.batch_number,
                    Box::new(move |b| {
                        if b.reserved_quantity < q {
                            return Err(InventoryError::InvalidState(format!(
                                "Batch {} holds {} reserved units, cannot release {}",
                                b.batch_number, b.reserved_quantity, q
                            )));
                        }
                        b.reserved_quantity -= q;
                        b.available_quantity += q;
                        Ok(())
                    }),
                )
                .await?;
        }
        Ok(())
    }

    /// Consumes explicit per-batch quantities following a committed
    /// allocation plan: `available -= q`, `quantity -= q` per line.
    pub async fn deduct_lines(&self, lines: &[LockLine]) -> Result<(), InventoryError> {
        for line in lines {
            let q = line.quantity;
            self.store
                .mutate_batch(
                    &line.batch_number,
                    Box::new(move |b| {
                        if b.available_quantity < q {
                            return Err(InventoryError::InsufficientStock {
                                requested: q,
                                available: b.available_quantity,
                            });
                        }
                        b.available_quantity -= q;
                        b.quantity -= q;
                        b.refresh_depletion();
                        Ok(())
                    }),
                )
                .await?;
        }
        Ok(())
    }

    /// Locks explicit per-batch quantities; every line is validated
    /// against the current counters before any is applied. Lines naming
    /// the same batch are summed for the validation pass, so a request
    /// that only fits line-by-line fails up front instead of midway.
    pub async fn lock_lines(&self, lines: &[LockLine]) -> Result<(), InventoryError> {
        let mut totals: HashMap<&str, i64> = HashMap::new();
        for line in lines {
            *totals.entry(line.batch_number.as_str()).or_insert(0) += line.quantity;
        }
        for (batch_number, wanted) in &totals {
            let batch = self
                .store
                .get_batch(batch_number)
                .await?
                .ok_or_else(|| {
                    InventoryError::NotFound(format!("Batch {} not found", batch_number))
                })?;
            if batch.available_quantity < *wanted {
                return Err(InventoryError::InsufficientStock {
                    requested: *wanted,
                    available: batch.available_quantity,
                });
            }
        }
        for line in lines {
            let q = line.quantity;
            self.store
                .mutate_batch(
                    &line.batch_number,
                    Box::new(move |b| {
                        if b.available_quantity < q {
                            return Err(InventoryError::InsufficientStock {
                                requested: q,
                                available: b.available_quantity,
                            });
                        }
                        b.available_quantity -= q;
                        b.locked_quantity += q;
                        Ok(())
                    }),
                )
                .await?;
        }
        Ok(())
    }

    /// Inverse of `lock_lines`; releases up to each line's quantity.
    pub async fn unlock_lines(&self, lines: &[LockLine]) -> Result<(), InventoryError> {
        for line in lines {
            let q = line.quantity;
            self.store
                .mutate_batch(
                    &line.batch_number,
                    Box::new(move |b| {
                        let release = q.min(b.locked_quantity);
                        b.locked_quantity -= release;
                        b.available_quantity += release;
                        Ok(())
                    }),
                )
                .await?;
        }
        Ok(())
    }

    async fn add_stock(&self, batch_number: &str, quantity: i64) -> Result<(), InventoryError> {
        self.store
            .mutate_batch(
                batch_number,
                Box::new(move |b| {
                    b.quantity += quantity;
                    b.available_quantity += quantity;
                    b.refresh_revival();
                    Ok(())
                }),
            )
            .await?;
        Ok(())
    }

    /// Atomically moves up to `want` units of one batch's counters and
    /// reports the amount actually moved.
    async fn take_counter(
        &self,
        batch_number: &str,
        want: i64,
        movement: CounterMove,
    ) -> Result<i64, InventoryError> {
        let taken = Arc::new(AtomicI64::new(0));
        let report = taken.clone();
        self.store
            .mutate_batch(
                batch_number,
                Box::new(move |b| {
                    let amount = match movement {
                        CounterMove::AvailableToLocked | CounterMove::Consume => {
                            want.min(b.available_quantity)
                        }
                        CounterMove::LockedToAvailable => want.min(b.locked_quantity),
                    };
                    match movement {
                        CounterMove::AvailableToLocked => {
                            b.available_quantity -= amount;
                            b.locked_quantity += amount;
                        }
                        CounterMove::LockedToAvailable => {
                            b.locked_quantity -= amount;
                            b.available_quantity += amount;
                        }
                        CounterMove::Consume => {
                            b.available_quantity -= amount;
                            b.quantity -= amount;
                            b.refresh_depletion();
                        }
                    }
                    report.store(amount, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .await?;
        Ok(taken.load(Ordering::SeqCst))
    }

    fn require_positive(&self, quantity: i64) -> Result<(), InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidArgument(format!(
                "Quantity must be positive, got {}",
                quantity
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum CounterMove {
    AvailableToLocked,
    LockedToAvailable,
    Consume,
}
