//! Reservation state machine.
//!
//! A reservation freezes its per-batch allocation map at reserve time;
//! confirm and release always restore or consume exactly that frozen map,
//! never a recomputation against a possibly-changed batch set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::EngineConfig;
use crate::entities::{
    Reservation, ReservationKind, ReservationLine, ReservationStatus, Sku,
};
use crate::errors::InventoryError;
use crate::events::{Event, EventSender};
use crate::services::allocation::AllocationEngine;
use crate::services::stock_operator::StockOperator;
use crate::store::{BatchStore, ReservationStore};

const AUTO_EXPIRE_REASON: &str = "Automatic expiration";

/// Input for creating a reservation.
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub sku: Sku,
    #[validate(range(min = 1))]
    pub quantity: i64,
    pub kind: ReservationKind,
    #[validate(length(min = 1))]
    pub business_id: String,
    /// Defaults to now + the configured reservation TTL.
    pub expires_at: Option<DateTime<Utc>>,
    pub operator: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Result of one expiry sweep run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// Reservations transitioned to expired with their stock restored.
    pub processed: u64,
    /// Reservations the sweep failed to process; left for the next run.
    pub failed: u64,
    pub swept_at: DateTime<Utc>,
}

/// Owns the reservation lifecycle and the expiry sweep.
pub struct ReservationEngine<S> {
    store: Arc<S>,
    allocation: AllocationEngine<S>,
    operator: StockOperator<S>,
    event_sender: EventSender,
    config: EngineConfig,
}

impl<S> Clone for ReservationEngine<S> {
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

impl<S: BatchStore + ReservationStore> ReservationEngine<S> {
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

    /// Plans an allocation with the default strategy, mirrors it into the
    /// batch counters, and persists a pending reservation with the
    /// allocation map frozen.
    #[instrument(skip(self, request), fields(sku = %request.sku, business_id = %request.business_id))]
    pub async fn reserve(&self, request: ReserveRequest) -> Result<Reservation, InventoryError> {
        request.validate().map_err(InventoryError::validation)?;

        let now = Utc::now();
        let expires_at = request
            .expires_at
            .unwrap_or_else(|| now + self.config.reservation_ttl());

        let plan = self
            .allocation
            .allocate(
                &request.sku,
                request.quantity,
                &self.config.default_strategy,
                None,
            )
            .await?;
        let allocations: Vec<ReservationLine> = plan
            .lines
            .iter()
            .map(|line| ReservationLine {
                batch_number: line.batch_number.clone(),
                quantity: line.quantity,
            })
            .collect();

        self.operator.apply_reserve(&allocations).await?;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            business_id: request.business_id,
            sku: request.sku,
            quantity: request.quantity,
            kind: request.kind,
            status: ReservationStatus::Pending,
            allocations,
            expires_at,
            operator: request.operator,
            notes: request.notes,
            released_reason: None,
            released_at: None,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_reservation(reservation.clone()).await?;

        info!(
            reservation_id = %reservation.id,
            quantity = reservation.quantity,
            batches = reservation.allocations.len(),
            "Stock reserved"
        );
        self.event_sender
            .send(Event::StockReserved {
                reservation_id: reservation.id,
                business_id: reservation.business_id.clone(),
                sku: reservation.sku.clone(),
                quantity: reservation.quantity,
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(reservation)
    }

    /// Durably consumes a pending reservation's stock.
    ///
    /// Expiry is a logical precondition checked against the clock here,
    /// independent of whether the sweep has already run.
    #[instrument(skip(self))]
    pub async fn confirm(&self, id: Uuid) -> Result<Reservation, InventoryError> {
        let mut reservation = self.get_required(id).await?;
        if reservation.status != ReservationStatus::Pending {
            return Err(InventoryError::InvalidState(format!(
                "Reservation {} is {} and cannot be confirmed",
                id,
                reservation.status.as_str()
            )));
        }
        let now = Utc::now();
        if reservation.is_expired(now) {
            return Err(InventoryError::Expired(format!(
                "Reservation {} expired at {}",
                id, reservation.expires_at
            )));
        }

        self.operator.apply_confirm(&reservation.allocations).await?;

        reservation.status = ReservationStatus::Confirmed;
        reservation.confirmed_at = Some(now);
        reservation.updated_at = now;
        self.store.update_reservation(reservation.clone()).await?;

        info!(reservation_id = %id, quantity = reservation.quantity, "Reservation confirmed");
        self.event_sender
            .send(Event::ReservationConfirmed {
                reservation_id: id,
                business_id: reservation.business_id.clone(),
                quantity: reservation.quantity,
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(reservation)
    }

    /// Returns a pending reservation's stock to the pool.
    /// Idempotent: releasing an already-released reservation is a no-op.
    #[instrument(skip(self))]
    pub async fn release(&self, id: Uuid, reason: &str) -> Result<Reservation, InventoryError> {
        let mut reservation = self.get_required(id).await?;
        match reservation.status {
            ReservationStatus::Released => return Ok(reservation),
            ReservationStatus::Pending => {}
            other => {
                return Err(InventoryError::InvalidState(format!(
                    "Reservation {} is {} and cannot be released",
                    id,
                    other.as_str()
                )));
            }
        }

        self.operator.apply_release(&reservation.allocations).await?;

        let now = Utc::now();
        reservation.status = ReservationStatus::Released;
        reservation.released_reason = Some(reason.to_string());
        reservation.released_at = Some(now);
        reservation.updated_at = now;
        self.store.update_reservation(reservation.clone()).await?;

        info!(reservation_id = %id, reason, "Reservation released");
        self.event_sender
            .send(Event::ReservationReleased {
                reservation_id: id,
                business_id: reservation.business_id.clone(),
                reason: reason.to_string(),
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(reservation)
    }

    /// Moves a pending reservation's expiry. No counter effect.
    #[instrument(skip(self))]
    pub async fn extend(
        &self,
        id: Uuid,
        new_expiry: DateTime<Utc>,
    ) -> Result<Reservation, InventoryError> {
        let mut reservation = self.get_required(id).await?;
        if reservation.status != ReservationStatus::Pending {
            return Err(InventoryError::InvalidState(format!(
                "Reservation {} is {} and cannot be extended",
                id,
                reservation.status.as_str()
            )));
        }
        reservation.expires_at = new_expiry;
        reservation.updated_at = Utc::now();
        self.store.update_reservation(reservation.clone()).await?;

        info!(reservation_id = %id, new_expiry = %new_expiry, "Reservation extended");
        Ok(reservation)
    }

    /// Transitions every overdue pending reservation to expired, restoring
    /// its held stock exactly as a release would.
    ///
    /// One reservation's failure must not abort the rest; the sweep
    /// reports partial success and leaves failures for the next run.
    /// Idempotent: a second run with no newly expired reservations
    /// processes zero items.
    #[instrument(skip(self))]
    pub async fn release_expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepOutcome, InventoryError> {
        let expired = self
            .store
            .find_expired_pending(now, self.config.sweep_batch_size)
            .await?;

        let mut processed = 0u64;
        let mut failed = 0u64;
        for mut reservation in expired {
            match self.expire_one(&mut reservation, now).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    failed += 1;
                    warn!(
                        reservation_id = %reservation.id,
                        error = %e,
                        "Failed to expire reservation"
                    );
                }
            }
        }

        info!(processed, failed, "Expired reservation sweep completed");
        if processed > 0 {
            self.event_sender
                .send(Event::ReservationsExpired {
                    processed,
                    swept_at: now,
                })
                .await
                .map_err(InventoryError::EventError)?;
        }

        Ok(SweepOutcome {
            processed,
            failed,
            swept_at: now,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Reservation>, InventoryError> {
        self.store.get_reservation(id).await
    }

    pub async fn find_by_business_id(
        &self,
        business_id: &str,
    ) -> Result<Vec<Reservation>, InventoryError> {
        self.store
            .find_reservations_by_business_id(business_id)
            .await
    }

    async fn expire_one(
        &self,
        reservation: &mut Reservation,
        now: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        self.operator.apply_release(&reservation.allocations).await?;
        reservation.status = ReservationStatus::Expired;
        reservation.released_reason = Some(AUTO_EXPIRE_REASON.to_string());
        reservation.released_at = Some(now);
        reservation.updated_at = now;
        self.store.update_reservation(reservation.clone()).await
    }

    async fn get_required(&self, id: Uuid) -> Result<Reservation, InventoryError> {
        self.store
            .get_reservation(id)
            .await?
            .ok_or_else(|| InventoryError::NotFound(format!("Reservation {} not found", id)))
    }
}
