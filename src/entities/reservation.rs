use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::batch::Sku;

/// Business classification of a reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationKind {
    Order,
    System,
    Promotion,
}

impl ReservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationKind::Order => "order",
            ReservationKind::System => "system",
            ReservationKind::Promotion => "promotion",
        }
    }
}

/// Status for inventory reservations. Only `Pending` is non-terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Released,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Released => "released",
            ReservationStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReservationStatus::Pending),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "released" => Some(ReservationStatus::Released),
            "expired" => Some(ReservationStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }

    /// Monotonic transition check; the status enum is the single source of
    /// truth for reservation state, timestamps are informational only.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (
                ReservationStatus::Pending,
                ReservationStatus::Confirmed
                    | ReservationStatus::Released
                    | ReservationStatus::Expired
            )
        )
    }
}

/// One line of the allocation map frozen at reserve time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub batch_number: String,
    pub quantity: i64,
}

/// A temporary hold of quantity against one SKU for one business
/// transaction.
///
/// While `Pending`, `quantity` is mirrored into the allocated batches'
/// `reserved_quantity` and subtracted from their `available_quantity`.
/// Confirm and release always restore or consume exactly the frozen
/// `allocations`, never a recomputation against the current batch set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub business_id: String,
    pub sku: Sku,
    pub quantity: i64,
    pub kind: ReservationKind,
    pub status: ReservationStatus,
    pub allocations: Vec<ReservationLine>,
    pub expires_at: DateTime<Utc>,
    pub operator: Option<String>,
    pub notes: Option<String>,
    pub released_reason: Option<String>,
    pub released_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Invariant: the frozen allocation map sums to the reserved quantity.
    pub fn allocations_consistent(&self) -> bool {
        self.allocations.iter().map(|l| l.quantity).sum::<i64>() == self.quantity
    }
}
