use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::batch::{QualityLevel, Sku};

/// Direction of a stock movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementDirection {
    Inbound,
    Outbound,
    Transfer,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::Inbound => "inbound",
            MovementDirection::Outbound => "outbound",
            MovementDirection::Transfer => "transfer",
        }
    }
}

/// Business reason for a movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    // Outbound
    Sales,
    Damage,
    Pick,
    // Inbound
    Purchase,
    Return,
    Production,
    // Either direction
    Transfer,
    Adjustment,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Sales => "sales",
            MovementKind::Damage => "damage",
            MovementKind::Pick => "pick",
            MovementKind::Purchase => "purchase",
            MovementKind::Return => "return",
            MovementKind::Production => "production",
            MovementKind::Transfer => "transfer",
            MovementKind::Adjustment => "adjustment",
        }
    }
}

/// A line item as the caller requested it, at SKU granularity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    pub sku: Sku,
    pub quantity: i64,
}

/// A line item as it was actually committed, at batch granularity.
/// One requested SKU line can expand into several allocated batch lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocatedLine {
    pub batch_number: String,
    pub sku: Sku,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub quality: QualityLevel,
    pub location_id: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

impl AllocatedLine {
    pub fn line_cost(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_cost
    }
}

/// Audit record persisted once per logical movement, carrying both the
/// requested and the actually allocated line items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: Uuid,
    pub direction: MovementDirection,
    pub kind: MovementKind,
    pub reference_id: String,
    pub requested: Vec<RequestedLine>,
    pub allocated: Vec<AllocatedLine>,
    pub total_quantity: i64,
    pub total_cost: Decimal,
    pub operator: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
