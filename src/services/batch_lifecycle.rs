//! Batch lifecycle management: creation, merge, split, adjustment, and
//! status transitions.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::entities::batch::weighted_average_cost;
use crate::entities::{Batch, BatchStatus, QualityLevel, Sku};
use crate::errors::InventoryError;
use crate::events::{Event, EventSender};
use crate::store::BatchStore;

/// Input for creating a batch on first inbound of a SKU + batch-number
/// pair.
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct NewBatch {
    #[validate(length(min = 1))]
    pub batch_number: String,
    pub sku: Sku,
    #[validate(range(min = 1))]
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub quality: QualityLevel,
    pub status: Option<BatchStatus>,
    pub location_id: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub metadata: Option<serde_json::Value>,
}

/// Creates, merges, splits, and status-transitions batches.
pub struct BatchLifecycleManager<S> {
    store: Arc<S>,
    event_sender: EventSender,
}

impl<S> Clone for BatchLifecycleManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            event_sender: self.event_sender.clone(),
        }
    }
}

impl<S: BatchStore> BatchLifecycleManager<S> {
    pub fn new(store: Arc<S>, event_sender: EventSender) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Creates a new batch with `available = quantity` and zeroed
    /// reserved/locked counters. Fails with `DuplicateBatch` on a
    /// batch-number collision.
    #[instrument(skip(self, input), fields(batch_number = %input.batch_number, sku = %input.sku))]
    pub async fn create_batch(&self, input: NewBatch) -> Result<Batch, InventoryError> {
        input.validate().map_err(InventoryError::validation)?;
        if input.sku.is_empty() {
            return Err(InventoryError::InvalidArgument(
                "SKU must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let batch = Batch {
            batch_number: input.batch_number,
            sku: input.sku,
            quantity: input.quantity,
            available_quantity: input.quantity,
            reserved_quantity: 0,
            locked_quantity: 0,
            unit_cost: input.unit_cost,
            quality: input.quality,
            status: input.status.unwrap_or(BatchStatus::Available),
            location_id: input.location_id,
            production_date: input.production_date,
            expiry_date: input.expiry_date,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_batch(batch.clone()).await?;

        info!(quantity = batch.quantity, "Batch created");
        self.event_sender
            .send(Event::BatchCreated {
                batch_number: batch.batch_number.clone(),
                sku: batch.sku.clone(),
                quantity: batch.quantity,
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(batch)
    }

    /// Merges two or more batches of the same SKU, quality and location
    /// into one new batch.
    ///
    /// The merged quantity is the sum of the source quantities; the merged
    /// unit cost is their quantity-weighted average. Sources become
    /// `Depleted` with `available = 0`; their `quantity` stays as a
    /// historical record.
    #[instrument(skip(self), fields(new_batch_number = %new_batch_number))]
    pub async fn merge_batches(
        &self,
        batch_numbers: &[String],
        new_batch_number: &str,
    ) -> Result<Batch, InventoryError> {
        if batch_numbers.len() < 2 {
            return Err(InventoryError::InvalidState(
                "Merge requires at least two source batches".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for number in batch_numbers {
            if !seen.insert(number.as_str()) {
                return Err(InventoryError::InvalidArgument(format!(
                    "Batch {} appears more than once in the merge input",
                    number
                )));
            }
        }

        let mut sources = Vec::with_capacity(batch_numbers.len());
        for number in batch_numbers {
            let batch = self
                .store
                .get_batch(number)
                .await?
                .ok_or_else(|| InventoryError::NotFound(format!("Batch {} not found", number)))?;
            sources.push(batch);
        }

        let first = &sources[0];
        for other in &sources[1..] {
            if other.sku != first.sku
                || other.quality != first.quality
                || other.location_id != first.location_id
            {
                return Err(InventoryError::IncompatibleBatches(format!(
                    "Batch {} differs from {} in SKU, quality, or location",
                    other.batch_number, first.batch_number
                )));
            }
        }
        for source in &sources {
            if source.reserved_quantity > 0 || source.locked_quantity > 0 {
                return Err(InventoryError::InvalidState(format!(
                    "Batch {} has reserved or locked stock and cannot be merged",
                    source.batch_number
                )));
            }
        }

        let merged_quantity: i64 = sources.iter().map(|b| b.quantity).sum();
        let mut merged_cost = Decimal::ZERO;
        let mut counted: i64 = 0;
        for source in &sources {
            merged_cost = weighted_average_cost(counted, merged_cost, source.quantity, source.unit_cost);
            counted += source.quantity;
        }

        let now = Utc::now();
        let merged = Batch {
            batch_number: new_batch_number.to_string(),
            sku: first.sku.clone(),
            quantity: merged_quantity,
            available_quantity: merged_quantity,
            reserved_quantity: 0,
            locked_quantity: 0,
            unit_cost: merged_cost,
            quality: first.quality,
            status: BatchStatus::Available,
            location_id: first.location_id.clone(),
            production_date: first.production_date,
            expiry_date: sources.iter().filter_map(|b| b.expiry_date).min(),
            metadata: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_batch(merged.clone()).await?;

        for number in batch_numbers {
            self.store
                .mutate_batch(
                    number,
                    Box::new(|b| {
                        b.available_quantity = 0;
                        b.status = BatchStatus::Depleted;
                        Ok(())
                    }),
                )
                .await?;
        }

        info!(
            sources = batch_numbers.len(),
            quantity = merged_quantity,
            "Batches merged"
        );
        self.event_sender
            .send(Event::BatchesMerged {
                sources: batch_numbers.to_vec(),
                merged_batch_number: merged.batch_number.clone(),
                quantity: merged_quantity,
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(merged)
    }

    /// Splits `split_qty` units out of a batch into a new batch cloning
    /// the source attributes.
    #[instrument(skip(self), fields(batch_number = %batch_number, new_batch_number = %new_batch_number))]
    pub async fn split_batch(
        &self,
        batch_number: &str,
        split_qty: i64,
        new_batch_number: &str,
    ) -> Result<Batch, InventoryError> {
        if split_qty <= 0 {
            return Err(InventoryError::InvalidArgument(format!(
                "Split quantity must be positive, got {}",
                split_qty
            )));
        }
        let source = self
            .store
            .get_batch(batch_number)
            .await?
            .ok_or_else(|| InventoryError::NotFound(format!("Batch {} not found", batch_number)))?;
        if split_qty > source.quantity || split_qty > source.available_quantity {
            return Err(InventoryError::InsufficientStock {
                requested: split_qty,
                available: source.available_quantity,
            });
        }
        if self.store.get_batch(new_batch_number).await?.is_some() {
            return Err(InventoryError::DuplicateBatch(new_batch_number.to_string()));
        }

        let now = Utc::now();
        let split = Batch {
            batch_number: new_batch_number.to_string(),
            sku: source.sku.clone(),
            quantity: split_qty,
            available_quantity: split_qty,
            reserved_quantity: 0,
            locked_quantity: 0,
            unit_cost: source.unit_cost,
            quality: source.quality,
            status: BatchStatus::Available,
            location_id: source.location_id.clone(),
            production_date: source.production_date,
            expiry_date: source.expiry_date,
            metadata: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_batch(split.clone()).await?;

        self.store
            .mutate_batch(
                batch_number,
                Box::new(move |b| {
                    if split_qty > b.available_quantity {
                        return Err(InventoryError::InsufficientStock {
                            requested: split_qty,
                            available: b.available_quantity,
                        });
                    }
                    b.quantity -= split_qty;
                    b.available_quantity -= split_qty;
                    b.refresh_depletion();
                    Ok(())
                }),
            )
            .await?;

        info!(quantity = split_qty, "Batch split");
        self.event_sender
            .send(Event::BatchSplit {
                source_batch_number: batch_number.to_string(),
                new_batch_number: new_batch_number.to_string(),
                quantity: split_qty,
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(split)
    }

    /// Applies a signed quantity adjustment.
    ///
    /// On a negative delta the available counter floors at zero rather
    /// than going negative; reserved and locked stock are untouched. This
    /// is deliberate shrinkage semantics: `available + reserved + locked`
    /// may drop below `quantity` afterwards.
    #[instrument(skip(self), fields(batch_number = %batch_number))]
    pub async fn adjust_quantity(
        &self,
        batch_number: &str,
        delta: i64,
        reason: Option<&str>,
    ) -> Result<Batch, InventoryError> {
        let updated = self
            .store
            .mutate_batch(
                batch_number,
                Box::new(move |b| {
                    if b.quantity + delta < 0 {
                        return Err(InventoryError::InvalidArgument(format!(
                            "Adjustment {} would drive batch quantity below zero (current {})",
                            delta, b.quantity
                        )));
                    }
                    b.quantity += delta;
                    b.available_quantity = (b.available_quantity + delta).max(0);
                    b.refresh_depletion();
                    b.refresh_revival();
                    Ok(())
                }),
            )
            .await?;

        info!(
            delta,
            new_quantity = updated.quantity,
            reason = reason.unwrap_or("unspecified"),
            "Batch quantity adjusted"
        );
        self.event_sender
            .send(Event::BatchAdjusted {
                batch_number: batch_number.to_string(),
                delta,
                new_quantity: updated.quantity,
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(updated)
    }

    /// Transitions a batch to a new status. No counter side effects.
    #[instrument(skip(self), fields(batch_number = %batch_number))]
    pub async fn update_status(
        &self,
        batch_number: &str,
        status: BatchStatus,
    ) -> Result<Batch, InventoryError> {
        let current = self
            .store
            .get_batch(batch_number)
            .await?
            .ok_or_else(|| InventoryError::NotFound(format!("Batch {} not found", batch_number)))?;
        let old_status = current.status;
        let updated = self
            .store
            .mutate_batch(
                batch_number,
                Box::new(move |b| {
                    b.status = status;
                    Ok(())
                }),
            )
            .await?;

        self.event_sender
            .send(Event::BatchStatusChanged {
                batch_number: batch_number.to_string(),
                old_status: old_status.as_str().to_string(),
                new_status: status.as_str().to_string(),
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(updated)
    }

    /// Transitions every live batch whose expiry date has passed to
    /// `Expired`. Returns the number of batches transitioned; one failure
    /// does not abort the rest.
    #[instrument(skip(self))]
    pub async fn mark_expired_batches(&self, today: NaiveDate) -> Result<u64, InventoryError> {
        let Some(cutoff) = today.pred_opt() else {
            return Ok(0);
        };
        let expired = self
            .store
            .find_expiring_between(NaiveDate::MIN, cutoff)
            .await?;

        let mut count = 0u64;
        for batch in expired {
            if !batch.status.is_live() {
                continue;
            }
            let result = self
                .store
                .mutate_batch(
                    &batch.batch_number,
                    Box::new(|b| {
                        b.status = BatchStatus::Expired;
                        Ok(())
                    }),
                )
                .await;
            match result {
                Ok(_) => count += 1,
                Err(e) => warn!(
                    batch_number = %batch.batch_number,
                    error = %e,
                    "Failed to mark batch expired"
                ),
            }
        }

        info!(count, "Expired batch sweep completed");
        Ok(count)
    }
}
