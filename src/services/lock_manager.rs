//! Operational (business) locks: coarse holds over explicit batch lists,
//! outside the reservation state machine. Used for maintenance, audits,
//! and promotion holds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{LockLine, LockStatus, StockLock};
use crate::errors::InventoryError;
use crate::events::{Event, EventSender};
use crate::services::stock_operator::StockOperator;
use crate::store::{BatchStore, LockStore};

/// Input for creating an operational lock.
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct LockRequest {
    #[validate(length(min = 1))]
    pub lines: Vec<LockLine>,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub created_by: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Caller-supplied opaque payload; the core never inspects it.
    pub metadata: Option<serde_json::Value>,
}

/// Creates and releases operational locks, and sweeps expired ones.
pub struct LockManager<S> {
    store: Arc<S>,
    operator: StockOperator<S>,
    event_sender: EventSender,
}

impl<S> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            operator: self.operator.clone(),
            event_sender: self.event_sender.clone(),
        }
    }
}

impl<S: BatchStore + LockStore> LockManager<S> {
    pub fn new(store: Arc<S>, operator: StockOperator<S>, event_sender: EventSender) -> Self {
        Self {
            store,
            operator,
            event_sender,
        }
    }

    /// Locks explicit per-batch quantities and persists the lock record.
    /// Every line is validated before any counter moves.
    #[instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn lock_batches(&self, request: LockRequest) -> Result<StockLock, InventoryError> {
        request.validate().map_err(InventoryError::validation)?;
        for line in &request.lines {
            if line.quantity <= 0 {
                return Err(InventoryError::InvalidArgument(format!(
                    "Lock quantity for batch {} must be positive, got {}",
                    line.batch_number, line.quantity
                )));
            }
        }

        self.operator.lock_lines(&request.lines).await?;

        let now = Utc::now();
        let lock = StockLock {
            id: Uuid::new_v4(),
            status: LockStatus::Active,
            reason: request.reason,
            lines: request.lines,
            created_by: request.created_by,
            expires_at: request.expires_at,
            metadata: request.metadata,
            released_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_lock(lock.clone()).await?;

        info!(lock_id = %lock.id, quantity = lock.total_quantity(), "Stock locked");
        self.event_sender
            .send(Event::StockLocked {
                lock_id: lock.id,
                quantity: lock.total_quantity(),
                reason: lock.reason.clone(),
            })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(lock)
    }

    /// Releases an active lock, restoring each line's quantity.
    /// Idempotent: releasing an already-released lock is a no-op.
    #[instrument(skip(self))]
    pub async fn release_lock(&self, id: Uuid) -> Result<StockLock, InventoryError> {
        let mut lock = self
            .store
            .get_lock(id)
            .await?
            .ok_or_else(|| InventoryError::NotFound(format!("Lock {} not found", id)))?;
        if lock.status == LockStatus::Released {
            return Ok(lock);
        }

        self.operator.unlock_lines(&lock.lines).await?;

        let now = Utc::now();
        lock.status = LockStatus::Released;
        lock.released_at = Some(now);
        lock.updated_at = now;
        self.store.update_lock(lock.clone()).await?;

        info!(lock_id = %id, "Lock released");
        self.event_sender
            .send(Event::StockUnlocked { lock_id: id })
            .await
            .map_err(InventoryError::EventError)?;

        Ok(lock)
    }

    /// Releases every active lock whose expiry has passed. One failure
    /// does not abort the rest.
    #[instrument(skip(self))]
    pub async fn release_expired_locks(&self, now: DateTime<Utc>) -> Result<u64, InventoryError> {
        let expired = self.store.find_expired_active(now).await?;

        let mut processed = 0u64;
        for lock in expired {
            match self.release_lock(lock.id).await {
                Ok(_) => processed += 1,
                Err(e) => warn!(lock_id = %lock.id, error = %e, "Failed to release expired lock"),
            }
        }

        info!(processed, "Expired lock sweep completed");
        Ok(processed)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<StockLock>, InventoryError> {
        self.store.get_lock(id).await
    }
}
