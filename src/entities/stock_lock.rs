use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an operational lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    Active,
    Released,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Active => "active",
            LockStatus::Released => "released",
        }
    }
}

/// One locked batch with its held quantity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockLine {
    pub batch_number: String,
    pub quantity: i64,
}

/// A coarse operational hold over a list of batches, outside the
/// reservation state machine. Used for non-selling holds such as
/// maintenance, audits, or promotions.
///
/// While `Active`, each line's quantity is mirrored into that batch's
/// `locked_quantity` and subtracted from its `available_quantity`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockLock {
    pub id: Uuid,
    pub status: LockStatus,
    pub reason: String,
    pub lines: Vec<LockLine>,
    pub created_by: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub released_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp < now).unwrap_or(false)
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}
