use serde::Serialize;

/// Error taxonomy for the batch inventory core.
///
/// Every variant is surfaced immediately to the direct caller; the engine
/// performs no internal retries. `InsufficientStock` is an expected workflow
/// outcome and carries enough detail for partial-fulfillment decisions.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum InventoryError {
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown allocation strategy: {0}")]
    UnknownStrategy(String),

    #[error("Duplicate batch: {0}")]
    DuplicateBatch(String),

    #[error("Incompatible batches: {0}")]
    IncompatibleBatches(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Reservation expired: {0}")]
    Expired(String),

    #[error("Event dispatch failed: {0}")]
    EventError(String),
}

impl InventoryError {
    /// Shortcut used at the top of service operations that validate DTOs.
    pub fn validation(errors: validator::ValidationErrors) -> Self {
        InventoryError::InvalidArgument(format!("Invalid input: {}", errors))
    }

    /// Whether the error is an expected business outcome rather than a
    /// caller or data-integrity bug.
    pub fn is_business_outcome(&self) -> bool {
        matches!(self, InventoryError::InsufficientStock { .. })
    }
}
