use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque product-variant identifier from the external catalog.
///
/// Equality and hashing are by identifier; the core never inspects the
/// contents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(id: impl Into<String>) -> Self {
        Sku(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Sku {
    fn from(s: &str) -> Self {
        Sku::new(s)
    }
}

/// Quality grade of a batch. Used for filtering and merge compatibility,
/// never for allocation ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityLevel {
    S,
    A,
    B,
    C,
}

impl QualityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::S => "S",
            QualityLevel::A => "A",
            QualityLevel::B => "B",
            QualityLevel::C => "C",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "S" => Some(QualityLevel::S),
            "A" => Some(QualityLevel::A),
            "B" => Some(QualityLevel::B),
            "C" => Some(QualityLevel::C),
            _ => None,
        }
    }
}

/// Lifecycle status of a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Pending,
    Available,
    Depleted,
    Expired,
    Damaged,
    Quarantined,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Available => "available",
            BatchStatus::Depleted => "depleted",
            BatchStatus::Expired => "expired",
            BatchStatus::Damaged => "damaged",
            BatchStatus::Quarantined => "quarantined",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BatchStatus::Pending),
            "available" => Some(BatchStatus::Available),
            "depleted" => Some(BatchStatus::Depleted),
            "expired" => Some(BatchStatus::Expired),
            "damaged" => Some(BatchStatus::Damaged),
            "quarantined" => Some(BatchStatus::Quarantined),
            _ => None,
        }
    }

    /// Statuses whose stock may still move. Expired, damaged and
    /// quarantined batches are excluded from allocation candidates.
    pub fn is_live(&self) -> bool {
        matches!(self, BatchStatus::Pending | BatchStatus::Available)
    }
}

/// A physically homogeneous lot of one SKU.
///
/// Counter invariant:
/// `available_quantity + reserved_quantity + locked_quantity <= quantity`,
/// with equality whenever no stock has been definitively consumed.
/// Batches are never deleted; depletion is a terminal status and the
/// `quantity` field is left as a historical record by merge operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_number: String,
    pub sku: Sku,
    pub quantity: i64,
    pub available_quantity: i64,
    pub reserved_quantity: i64,
    pub locked_quantity: i64,
    pub unit_cost: Decimal,
    pub quality: QualityLevel,
    pub status: BatchStatus,
    pub location_id: Option<String>,
    pub production_date: Option<NaiveDate>,
    /// Batches with no expiry never appear in expiry-driven queries and
    /// sort last under FEFO.
    pub expiry_date: Option<NaiveDate>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// Marks the batch depleted once its total quantity reaches zero.
    pub fn refresh_depletion(&mut self) {
        if self.quantity == 0 && self.status.is_live() {
            self.status = BatchStatus::Depleted;
        }
    }

    /// Returns a depleted batch to available once it holds stock again.
    /// The inverse of [`refresh_depletion`](Self::refresh_depletion);
    /// expired, damaged and quarantined batches stay where they are.
    pub fn refresh_revival(&mut self) {
        if self.quantity > 0 && self.status == BatchStatus::Depleted {
            self.status = BatchStatus::Available;
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Counter sanity check, used by tests and debug assertions.
    pub fn counters_consistent(&self) -> bool {
        self.quantity >= 0
            && self.available_quantity >= 0
            && self.reserved_quantity >= 0
            && self.locked_quantity >= 0
            && self.available_quantity + self.reserved_quantity + self.locked_quantity
                <= self.quantity
    }
}

/// Running weighted-average unit cost after an inbound receipt onto an
/// existing batch. Kept as a pure function so the invariant is auditable
/// in isolation.
pub fn weighted_average_cost(
    old_qty: i64,
    old_cost: Decimal,
    added_qty: i64,
    added_cost: Decimal,
) -> Decimal {
    let total = old_qty + added_qty;
    if total <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(old_qty) * old_cost + Decimal::from(added_qty) * added_cost)
        / Decimal::from(total)
}
