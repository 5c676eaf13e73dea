//! Allocation planning.
//!
//! The engine separates planning from commitment: `allocate` is strictly
//! read-only and either returns a plan summing exactly to the requested
//! quantity or fails atomically with `InsufficientStock`. Committing a
//! plan is the caller's decision, made through the stock operator.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::entities::{QualityLevel, Sku};
use crate::errors::InventoryError;
use crate::services::strategy::StrategyRegistry;
use crate::store::BatchStore;

/// One planned line: take `quantity` units from `batch_number`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub batch_number: String,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub quality: QualityLevel,
    pub location_id: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// The contract between the allocation engine and its callers.
///
/// Guarantees: line quantities sum exactly to `requested`, and each line's
/// quantity did not exceed that batch's available quantity at plan time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub sku: Sku,
    pub requested: i64,
    pub strategy: String,
    pub lines: Vec<AllocationLine>,
}

impl AllocationResult {
    pub fn allocated(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.lines
            .iter()
            .map(|l| Decimal::from(l.quantity) * l.unit_cost)
            .sum()
    }
}

/// Plans which batches satisfy a requested quantity.
pub struct AllocationEngine<S> {
    store: Arc<S>,
    registry: StrategyRegistry,
}

impl<S> Clone for AllocationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<S: BatchStore> AllocationEngine<S> {
    pub fn new(store: Arc<S>, registry: StrategyRegistry) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Plans an allocation of `quantity` units of `sku`.
    ///
    /// Validates total sufficiency up front and fails atomically; a
    /// partial plan is never returned and no counter is mutated here.
    #[instrument(skip(self), fields(sku = %sku, strategy = %strategy_name))]
    pub async fn allocate(
        &self,
        sku: &Sku,
        quantity: i64,
        strategy_name: &str,
        location: Option<&str>,
    ) -> Result<AllocationResult, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidArgument(format!(
                "Allocation quantity must be positive, got {}",
                quantity
            )));
        }
        let strategy = self.registry.get(strategy_name)?;

        let mut candidates = self.store.find_available_by_sku(sku, location).await?;
        let total_available: i64 = candidates.iter().map(|b| b.available_quantity).sum();
        if total_available < quantity {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available: total_available,
            });
        }

        strategy.order(&mut candidates);

        let mut remaining = quantity;
        let mut lines = Vec::new();
        for batch in &candidates {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.available_quantity);
            if take == 0 {
                continue;
            }
            lines.push(AllocationLine {
                batch_number: batch.batch_number.clone(),
                quantity: take,
                unit_cost: batch.unit_cost,
                quality: batch.quality,
                location_id: batch.location_id.clone(),
                expiry_date: batch.expiry_date,
            });
            remaining -= take;
        }
        debug_assert_eq!(remaining, 0);

        info!(
            requested = quantity,
            batches = lines.len(),
            "Allocation planned"
        );

        Ok(AllocationResult {
            sku: sku.clone(),
            requested: quantity,
            strategy: strategy_name.to_string(),
            lines,
        })
    }

    /// Total quantity currently available for new allocations of `sku`.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn check_availability(
        &self,
        sku: &Sku,
        location: Option<&str>,
    ) -> Result<i64, InventoryError> {
        let candidates = self.store.find_available_by_sku(sku, location).await?;
        Ok(candidates.iter().map(|b| b.available_quantity).sum())
    }
}
