//! Point-in-time aggregate snapshots and the numeric diff between two of
//! them. Report formatting on top of the diff is out of scope.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

use crate::entities::Sku;
use crate::errors::InventoryError;
use crate::store::BatchStore;

/// Per-SKU aggregate inside one snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkuAggregate {
    pub quantity: i64,
    pub value: Decimal,
    pub batch_numbers: Vec<String>,
}

/// A point-in-time aggregate view of the whole inventory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub skus: BTreeMap<Sku, SkuAggregate>,
}

impl Snapshot {
    pub fn total_quantity(&self) -> i64 {
        self.skus.values().map(|a| a.quantity).sum()
    }

    pub fn total_value(&self) -> Decimal {
        self.skus.values().map(|a| a.value).sum()
    }
}

/// Delta for one SKU between two snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkuDelta {
    pub sku: Sku,
    pub quantity_delta: i64,
    pub value_delta: Decimal,
    /// Percentage change of value against the earlier snapshot. Zero-base
    /// changes report a fixed sentinel instead of dividing by zero: 0 for
    /// a zero-to-zero change, 100 for pure appearance, -100 for pure
    /// disappearance.
    pub pct_change: Decimal,
}

/// Numeric diff between two snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub earlier_at: DateTime<Utc>,
    pub later_at: DateTime<Utc>,
    pub total_quantity_delta: i64,
    pub total_value_delta: Decimal,
    pub total_pct_change: Decimal,
    /// SKUs present in both snapshots with a nonzero delta.
    pub changed: Vec<SkuDelta>,
    /// SKUs present only in the later snapshot.
    pub added: Vec<SkuDelta>,
    /// SKUs present only in the earlier snapshot; their full quantity and
    /// value count as a negative delta.
    pub removed: Vec<SkuDelta>,
}

/// Builds snapshots from live batches and computes deltas between them.
#[derive(Clone, Debug, Default)]
pub struct SnapshotDiffEngine;

impl SnapshotDiffEngine {
    pub fn new() -> Self {
        Self
    }

    /// Captures an aggregate view of every batch with remaining quantity.
    #[instrument(skip(self, store))]
    pub async fn capture<S: BatchStore>(&self, store: &S) -> Result<Snapshot, InventoryError> {
        let mut skus: BTreeMap<Sku, SkuAggregate> = BTreeMap::new();
        for batch in store.list_batches().await? {
            if batch.quantity == 0 {
                continue;
            }
            let entry = skus.entry(batch.sku.clone()).or_insert_with(|| SkuAggregate {
                quantity: 0,
                value: Decimal::ZERO,
                batch_numbers: Vec::new(),
            });
            entry.quantity += batch.quantity;
            entry.value += Decimal::from(batch.quantity) * batch.unit_cost;
            entry.batch_numbers.push(batch.batch_number);
        }
        Ok(Snapshot {
            taken_at: Utc::now(),
            skus,
        })
    }

    /// Computes quantity and value deltas between two snapshots. Pure:
    /// no store access.
    pub fn diff(&self, earlier: &Snapshot, later: &Snapshot) -> SnapshotDiff {
        let mut changed = Vec::new();
        let mut added = Vec::new();
        let mut removed = Vec::new();

        for (sku, late) in &later.skus {
            match earlier.skus.get(sku) {
                Some(early) => {
                    let quantity_delta = late.quantity - early.quantity;
                    let value_delta = late.value - early.value;
                    if quantity_delta == 0 && value_delta == Decimal::ZERO {
                        continue;
                    }
                    changed.push(SkuDelta {
                        sku: sku.clone(),
                        quantity_delta,
                        value_delta,
                        pct_change: pct_of_base(value_delta, early.value),
                    });
                }
                None => added.push(SkuDelta {
                    sku: sku.clone(),
                    quantity_delta: late.quantity,
                    value_delta: late.value,
                    pct_change: dec!(100),
                }),
            }
        }
        for (sku, early) in &earlier.skus {
            if !later.skus.contains_key(sku) {
                removed.push(SkuDelta {
                    sku: sku.clone(),
                    quantity_delta: -early.quantity,
                    value_delta: -early.value,
                    pct_change: dec!(-100),
                });
            }
        }

        let total_value_delta = later.total_value() - earlier.total_value();
        SnapshotDiff {
            earlier_at: earlier.taken_at,
            later_at: later.taken_at,
            total_quantity_delta: later.total_quantity() - earlier.total_quantity(),
            total_value_delta,
            total_pct_change: pct_of_base(total_value_delta, earlier.total_value()),
            changed,
            added,
            removed,
        }
    }
}

fn pct_of_base(delta: Decimal, base: Decimal) -> Decimal {
    if base == Decimal::ZERO {
        if delta == Decimal::ZERO {
            Decimal::ZERO
        } else {
            dec!(100)
        }
    } else {
        delta / base * dec!(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(quantity: i64, value: Decimal) -> SkuAggregate {
        SkuAggregate {
            quantity,
            value,
            batch_numbers: vec![],
        }
    }

    fn snapshot(entries: Vec<(&str, i64, Decimal)>) -> Snapshot {
        Snapshot {
            taken_at: Utc::now(),
            skus: entries
                .into_iter()
                .map(|(sku, qty, value)| (Sku::new(sku), aggregate(qty, value)))
                .collect(),
        }
    }

    #[test]
    fn diff_classifies_changed_added_and_removed_skus() {
        let engine = SnapshotDiffEngine::new();
        let earlier = snapshot(vec![
            ("A", 10, dec!(100)),
            ("B", 5, dec!(50)),
            ("GONE", 3, dec!(30)),
        ]);
        let later = snapshot(vec![
            ("A", 8, dec!(80)),
            ("B", 5, dec!(50)),
            ("NEW", 2, dec!(20)),
        ]);

        let diff = engine.diff(&earlier, &later);

        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].sku, Sku::new("A"));
        assert_eq!(diff.changed[0].quantity_delta, -2);
        assert_eq!(diff.changed[0].pct_change, dec!(-20));

        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].sku, Sku::new("NEW"));
        assert_eq!(diff.added[0].pct_change, dec!(100));

        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].sku, Sku::new("GONE"));
        assert_eq!(diff.removed[0].quantity_delta, -3);
        assert_eq!(diff.removed[0].pct_change, dec!(-100));

        assert_eq!(diff.total_quantity_delta, -3);
        assert_eq!(diff.total_value_delta, dec!(-30));
    }

    #[test]
    fn zero_base_percentages_use_sentinels() {
        let engine = SnapshotDiffEngine::new();
        let empty = snapshot(vec![]);
        let loaded = snapshot(vec![("A", 1, dec!(10))]);

        let appearing = engine.diff(&empty, &loaded);
        assert_eq!(appearing.total_pct_change, dec!(100));

        let unchanged = engine.diff(&empty, &empty);
        assert_eq!(unchanged.total_pct_change, Decimal::ZERO);
    }
}
