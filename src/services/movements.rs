//! Movement processors: the business operations composed from the
//! allocation engine, stock operator, and batch lifecycle manager.
//!
//! Every processor follows one shape: validate the request, resolve or
//! create batches, commit counters, then persist one audit record carrying
//! both the requested line items and the actually allocated batch lines.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::config::EngineConfig;
use crate::entities::batch::weighted_average_cost;
use crate::entities::{
    AllocatedLine, Batch, BatchStatus, LockLine, MovementDirection, MovementKind, MovementRecord,
    QualityLevel, RequestedLine, Sku,
};
use crate::errors::InventoryError;
use crate::events::{Event, EventSender};
use crate::services::allocation::AllocationEngine;
use crate::services::batch_lifecycle::{BatchLifecycleManager, NewBatch};
use crate::services::stock_operator::StockOperator;
use crate::store::{BatchStore, MovementLog};

/// Request for an outbound movement (sales, damage, pick, adjustment,
/// transfer-out).
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub kind: MovementKind,
    #[validate(length(min = 1))]
    pub reference_id: String,
    #[validate(length(min = 1))]
    pub lines: Vec<RequestedLine>,
    /// Defaults to the configured allocation strategy.
    pub strategy: Option<String>,
    pub location: Option<String>,
    pub operator: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// One inbound receipt line at batch granularity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InboundLine {
    pub sku: Sku,
    pub batch_number: String,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub quality: Option<QualityLevel>,
    pub location_id: Option<String>,
    pub production_date: Option<chrono::NaiveDate>,
    pub expiry_date: Option<chrono::NaiveDate>,
}

/// Request for an inbound movement (purchase, return, production,
/// adjustment, transfer-in).
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct InboundRequest {
    pub kind: MovementKind,
    #[validate(length(min = 1))]
    pub reference_id: String,
    #[validate(length(min = 1))]
    pub lines: Vec<InboundLine>,
    pub operator: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Request to move quantity of one SKU between locations.
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sku: Sku,
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(length(min = 1))]
    pub from_location: String,
    #[validate(length(min = 1))]
    pub to_location: String,
    #[validate(length(min = 1))]
    pub reference_id: String,
    pub strategy: Option<String>,
    pub operator: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Processes outbound movements: allocation plan, committed deduction,
/// audit record.
pub struct OutboundProcessor<S> {
    store: Arc<S>,
    allocation: AllocationEngine<S>,
    operator: StockOperator<S>,
    event_sender: EventSender,
    config: EngineConfig,
}

impl<S> Clone for OutboundProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            allocation: self.allocation.clone(),
            operator: self.operator.clone(),
            event_sender: self.event_sender.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: BatchStore + MovementLog> OutboundProcessor<S> {
    pub fn new(
        store: Arc<S>,
        allocation: AllocationEngine<S>,
        operator: StockOperator<S>,
        event_sender: EventSender,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            allocation,
            operator,
            event_sender,
            config,
        }
    }

    #[instrument(skip(self, request), fields(reference_id = %request.reference_id))]
    pub async fn process(&self, request: OutboundRequest) -> Result<MovementRecord, InventoryError> {
        request.validate().map_err(InventoryError::validation)?;
        if !matches!(
            request.kind,
            MovementKind::Sales
                | MovementKind::Damage
                | MovementKind::Pick
                | MovementKind::Adjustment
                | MovementKind::Transfer
        ) {
            return Err(InventoryError::InvalidArgument(format!(
                "{} is not an outbound movement kind",
                request.kind.as_str()
            )));
        }
        for line in &request.lines {
            if line.quantity <= 0 {
                return Err(InventoryError::InvalidArgument(format!(
                    "Outbound quantity for SKU {} must be positive, got {}",
                    line.sku, line.quantity
                )));
            }
        }

        let strategy = request
            .strategy
            .as_deref()
            .unwrap_or(&self.config.default_strategy);

        // Sufficiency is checked on the per-SKU totals before any line
        // commits, so a later line cannot fail after earlier lines have
        // already deducted stock.
        let mut totals: HashMap<&Sku, i64> = HashMap::new();
        for line in &request.lines {
            *totals.entry(&line.sku).or_insert(0) += line.quantity;
        }
        for (sku, wanted) in &totals {
            let available = self
                .allocation
                .check_availability(sku, request.location.as_deref())
                .await?;
            if available < *wanted {
                return Err(InventoryError::InsufficientStock {
                    requested: *wanted,
                    available,
                });
            }
        }

        let mut allocated = Vec::new();
        let mut total_quantity = 0i64;
        let mut total_cost = Decimal::ZERO;
        for line in &request.lines {
            let plan = self
                .allocation
                .allocate(
                    &line.sku,
                    line.quantity,
                    strategy,
                    request.location.as_deref(),
                )
                .await?;

            let deductions: Vec<LockLine> = plan
                .lines
                .iter()
                .map(|l| LockLine {
                    batch_number: l.batch_number.clone(),
                    quantity: l.quantity,
                })
                .collect();
            self.operator.deduct_lines(&deductions).await?;

            for planned in plan.lines {
                total_quantity += planned.quantity;
                total_cost += Decimal::from(planned.quantity) * planned.unit_cost;
                allocated.push(AllocatedLine {
                    batch_number: planned.batch_number,
                    sku: line.sku.clone(),
                    quantity: planned.quantity,
                    unit_cost: planned.unit_cost,
                    quality: planned.quality,
                    location_id: planned.location_id,
                    expiry_date: planned.expiry_date,
                });
            }
        }

        let record = MovementRecord {
            id: Uuid::new_v4(),
            direction: MovementDirection::Outbound,
            kind: request.kind,
            reference_id: request.reference_id.clone(),
            requested: request.lines,
            allocated,
            total_quantity,
            total_cost,
            operator: request.operator,
            notes: request.notes,
            occurred_at: Utc::now(),
        };
        self.store.append_movement(record.clone()).await?;

        info!(
            total_quantity,
            batches = record.allocated.len(),
            kind = record.kind.as_str(),
            "Outbound movement committed"
        );
        self.event_sender
            .send(Event::OutboundShipped {
                reference_id: request.reference_id,
                total_quantity,
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(record)
    }
}

/// Processes inbound movements: existing batches get a quantity top-up and
/// a running weighted-average re-cost; unknown batch numbers create new
/// batches.
pub struct InboundProcessor<S> {
    store: Arc<S>,
    lifecycle: BatchLifecycleManager<S>,
    event_sender: EventSender,
}

impl<S> Clone for InboundProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            lifecycle: self.lifecycle.clone(),
            event_sender: self.event_sender.clone(),
        }
    }
}

impl<S: BatchStore + MovementLog> InboundProcessor<S> {
    pub fn new(
        store: Arc<S>,
        lifecycle: BatchLifecycleManager<S>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            store,
            lifecycle,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(reference_id = %request.reference_id))]
    pub async fn process(&self, request: InboundRequest) -> Result<MovementRecord, InventoryError> {
        request.validate().map_err(InventoryError::validation)?;
        if !matches!(
            request.kind,
            MovementKind::Purchase
                | MovementKind::Return
                | MovementKind::Production
                | MovementKind::Adjustment
                | MovementKind::Transfer
        ) {
            return Err(InventoryError::InvalidArgument(format!(
                "{} is not an inbound movement kind",
                request.kind.as_str()
            )));
        }
        for line in &request.lines {
            if line.quantity <= 0 {
                return Err(InventoryError::InvalidArgument(format!(
                    "Inbound quantity for batch {} must be positive, got {}",
                    line.batch_number, line.quantity
                )));
            }
        }

        let mut allocated = Vec::new();
        let mut total_quantity = 0i64;
        let mut total_cost = Decimal::ZERO;
        for line in &request.lines {
            let batch = self.receive_line(line).await?;
            total_quantity += line.quantity;
            total_cost += Decimal::from(line.quantity) * line.unit_cost;
            allocated.push(AllocatedLine {
                batch_number: batch.batch_number.clone(),
                sku: batch.sku.clone(),
                quantity: line.quantity,
                unit_cost: line.unit_cost,
                quality: batch.quality,
                location_id: batch.location_id.clone(),
                expiry_date: batch.expiry_date,
            });
        }

        let requested = request
            .lines
            .iter()
            .map(|l| RequestedLine {
                sku: l.sku.clone(),
                quantity: l.quantity,
            })
            .collect();

        let record = MovementRecord {
            id: Uuid::new_v4(),
            direction: MovementDirection::Inbound,
            kind: request.kind,
            reference_id: request.reference_id.clone(),
            requested,
            allocated,
            total_quantity,
            total_cost,
            operator: request.operator,
            notes: request.notes,
            occurred_at: Utc::now(),
        };
        self.store.append_movement(record.clone()).await?;

        info!(
            total_quantity,
            kind = record.kind.as_str(),
            "Inbound movement committed"
        );
        self.event_sender
            .send(Event::InboundReceived {
                reference_id: request.reference_id,
                total_quantity,
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(record)
    }

    async fn receive_line(&self, line: &InboundLine) -> Result<Batch, InventoryError> {
        match self.store.get_batch(&line.batch_number).await? {
            Some(existing) => {
                if existing.sku != line.sku {
                    return Err(InventoryError::InvalidArgument(format!(
                        "Batch {} belongs to SKU {}, not {}",
                        line.batch_number, existing.sku, line.sku
                    )));
                }
                let quantity = line.quantity;
                let unit_cost = line.unit_cost;
                self.store
                    .mutate_batch(
                        &line.batch_number,
                        Box::new(move |b| {
                            b.unit_cost = weighted_average_cost(
                                b.quantity,
                                b.unit_cost,
                                quantity,
                                unit_cost,
                            );
                            b.quantity += quantity;
                            b.available_quantity += quantity;
                            b.refresh_revival();
                            Ok(())
                        }),
                    )
                    .await
            }
            None => {
                self.lifecycle
                    .create_batch(NewBatch {
                        batch_number: line.batch_number.clone(),
                        sku: line.sku.clone(),
                        quantity: line.quantity,
                        unit_cost: line.unit_cost,
                        quality: line.quality.unwrap_or(QualityLevel::A),
                        status: None,
                        location_id: line.location_id.clone(),
                        production_date: line.production_date,
                        expiry_date: line.expiry_date,
                        metadata: None,
                    })
                    .await
            }
        }
    }
}

/// Processes inter-location transfers: a strategy-driven deduction at the
/// source location paired with a receipt at the destination, conserving
/// total quantity and carrying unit cost.
pub struct TransferProcessor<S> {
    store: Arc<S>,
    allocation: AllocationEngine<S>,
    operator: StockOperator<S>,
    event_sender: EventSender,
    config: EngineConfig,
}

impl<S> Clone for TransferProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            allocation: self.allocation.clone(),
            operator: self.operator.clone(),
            event_sender: self.event_sender.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: BatchStore + MovementLog> TransferProcessor<S> {
    pub fn new(
        store: Arc<S>,
        allocation: AllocationEngine<S>,
        operator: StockOperator<S>,
        event_sender: EventSender,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            allocation,
            operator,
            event_sender,
            config,
        }
    }

    #[instrument(skip(self, request), fields(sku = %request.sku, reference_id = %request.reference_id))]
    pub async fn process(&self, request: TransferRequest) -> Result<MovementRecord, InventoryError> {
        request.validate().map_err(InventoryError::validation)?;
        if request.from_location == request.to_location {
            return Err(InventoryError::InvalidArgument(
                "Transfer source and destination locations must differ".to_string(),
            ));
        }

        let strategy = request
            .strategy
            .as_deref()
            .unwrap_or(&self.config.default_strategy);

        let plan = self
            .allocation
            .allocate(
                &request.sku,
                request.quantity,
                strategy,
                Some(&request.from_location),
            )
            .await?;

        let mut allocated = Vec::new();
        let mut total_cost = Decimal::ZERO;
        for planned in &plan.lines {
            let source = self
                .store
                .get_batch(&planned.batch_number)
                .await?
                .ok_or_else(|| {
                    InventoryError::NotFound(format!("Batch {} not found", planned.batch_number))
                })?;

            self.operator
                .deduct_lines(&[LockLine {
                    batch_number: planned.batch_number.clone(),
                    quantity: planned.quantity,
                }])
                .await?;
            self.receive_at_destination(&source, planned.quantity, &request.to_location)
                .await?;

            total_cost += Decimal::from(planned.quantity) * planned.unit_cost;
            allocated.push(AllocatedLine {
                batch_number: planned.batch_number.clone(),
                sku: request.sku.clone(),
                quantity: planned.quantity,
                unit_cost: planned.unit_cost,
                quality: planned.quality,
                location_id: Some(request.to_location.clone()),
                expiry_date: planned.expiry_date,
            });
        }

        let record = MovementRecord {
            id: Uuid::new_v4(),
            direction: MovementDirection::Transfer,
            kind: MovementKind::Transfer,
            reference_id: request.reference_id.clone(),
            requested: vec![RequestedLine {
                sku: request.sku.clone(),
                quantity: request.quantity,
            }],
            allocated,
            total_quantity: request.quantity,
            total_cost,
            operator: request.operator,
            notes: request.notes,
            occurred_at: Utc::now(),
        };
        self.store.append_movement(record.clone()).await?;

        info!(
            quantity = request.quantity,
            from = %request.from_location,
            to = %request.to_location,
            "Transfer committed"
        );
        self.event_sender
            .send(Event::StockTransferred {
                reference_id: request.reference_id,
                sku: request.sku,
                quantity: request.quantity,
                from_location: request.from_location,
                to_location: request.to_location,
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(record)
    }

    /// Destination batches reuse the source batch number suffixed with the
    /// destination location, so repeated transfers of the same batch
    /// accumulate instead of colliding.
    async fn receive_at_destination(
        &self,
        source: &Batch,
        quantity: i64,
        to_location: &str,
    ) -> Result<(), InventoryError> {
        let dest_number = format!("{}@{}", source.batch_number, to_location);
        match self.store.get_batch(&dest_number).await? {
            Some(existing) => {
                if existing.sku != source.sku {
                    return Err(InventoryError::IncompatibleBatches(format!(
                        "Destination batch {} holds a different SKU",
                        dest_number
                    )));
                }
                let unit_cost = source.unit_cost;
                self.store
                    .mutate_batch(
                        &dest_number,
                        Box::new(move |b| {
                            b.unit_cost =
                                weighted_average_cost(b.quantity, b.unit_cost, quantity, unit_cost);
                            b.quantity += quantity;
                            b.available_quantity += quantity;
                            b.refresh_revival();
                            Ok(())
                        }),
                    )
                    .await?;
                Ok(())
            }
            None => {
                let now = Utc::now();
                self.store
                    .insert_batch(Batch {
                        batch_number: dest_number,
                        sku: source.sku.clone(),
                        quantity,
                        available_quantity: quantity,
                        reserved_quantity: 0,
                        locked_quantity: 0,
                        unit_cost: source.unit_cost,
                        quality: source.quality,
                        status: BatchStatus::Available,
                        location_id: Some(to_location.to_string()),
                        production_date: source.production_date,
                        expiry_date: source.expiry_date,
                        metadata: None,
                        created_at: now,
                        updated_at: now,
                    })
                    .await
            }
        }
    }
}
