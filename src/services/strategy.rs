//! Allocation ordering strategies.
//!
//! A strategy is a pure, side-effect-free total ordering over a candidate
//! batch set. The registry keeps the strategy set open: new orderings are
//! registered by name at runtime without touching the engine.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;

use crate::entities::Batch;
use crate::errors::InventoryError;

/// A total ordering over candidate batches for one demand.
pub trait AllocationStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Reorders the candidate set in place. Must not mutate the batches
    /// themselves.
    fn order(&self, batches: &mut Vec<Batch>);
}

/// First-in-first-out: oldest batches first.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fifo;

impl AllocationStrategy for Fifo {
    fn name(&self) -> &str {
        "fifo"
    }

    fn order(&self, batches: &mut Vec<Batch>) {
        batches.sort_by_key(|b| b.created_at);
    }
}

/// Last-in-first-out: newest batches first.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lifo;

impl AllocationStrategy for Lifo {
    fn name(&self) -> &str {
        "lifo"
    }

    fn order(&self, batches: &mut Vec<Batch>) {
        batches.sort_by_key(|b| std::cmp::Reverse(b.created_at));
    }
}

/// First-expiry-first-out: soonest expiry first. Batches without an
/// expiry date are treated as expiring never and sort last; ties fall
/// back to FIFO order.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fefo;

impl AllocationStrategy for Fefo {
    fn name(&self) -> &str {
        "fefo"
    }

    fn order(&self, batches: &mut Vec<Batch>) {
        batches.sort_by_key(|b| {
            (
                b.expiry_date.unwrap_or(NaiveDate::MAX),
                b.created_at,
            )
        });
    }
}

/// Named registry of allocation strategies. `Default` ships fifo, lifo
/// and fefo; additional strategies can be registered at runtime.
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: Arc<RwLock<HashMap<String, Arc<dyn AllocationStrategy>>>>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            strategies: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register(&self, strategy: Arc<dyn AllocationStrategy>) {
        self.strategies
            .write()
            .expect("strategy registry poisoned")
            .insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn AllocationStrategy>, InventoryError> {
        self.strategies
            .read()
            .expect("strategy registry poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| InventoryError::UnknownStrategy(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .strategies
            .read()
            .expect("strategy registry poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let registry = Self::empty();
        registry.register(Arc::new(Fifo));
        registry.register(Arc::new(Lifo));
        registry.register(Arc::new(Fefo));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{BatchStatus, QualityLevel, Sku};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn batch(number: &str, created_day: u32, expiry: Option<NaiveDate>) -> Batch {
        Batch {
            batch_number: number.into(),
            sku: Sku::new("SKU-1"),
            quantity: 10,
            available_quantity: 10,
            reserved_quantity: 0,
            locked_quantity: 0,
            unit_cost: Decimal::ZERO,
            quality: QualityLevel::A,
            status: BatchStatus::Available,
            location_id: None,
            production_date: None,
            expiry_date: expiry,
            metadata: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, created_day, 0, 0, 0).unwrap(),
            updated_at: Utc::now(),
        }
    }

    fn numbers(batches: &[Batch]) -> Vec<&str> {
        batches.iter().map(|b| b.batch_number.as_str()).collect()
    }

    #[test]
    fn fifo_orders_oldest_first() {
        let mut batches = vec![batch("B", 20, None), batch("A", 1, None)];
        Fifo.order(&mut batches);
        assert_eq!(numbers(&batches), ["A", "B"]);
    }

    #[test]
    fn lifo_orders_newest_first() {
        let mut batches = vec![batch("A", 1, None), batch("B", 20, None)];
        Lifo.order(&mut batches);
        assert_eq!(numbers(&batches), ["B", "A"]);
    }

    #[test]
    fn fefo_puts_no_expiry_last_and_breaks_ties_by_fifo() {
        let june = NaiveDate::from_ymd_opt(2024, 6, 1);
        let mut batches = vec![
            batch("NEVER", 1, None),
            batch("JUNE-LATE", 15, june),
            batch("JUNE-EARLY", 2, june),
            batch("MARCH", 20, NaiveDate::from_ymd_opt(2024, 3, 1)),
        ];
        Fefo.order(&mut batches);
        assert_eq!(numbers(&batches), ["MARCH", "JUNE-EARLY", "JUNE-LATE", "NEVER"]);
    }

    #[test]
    fn registry_resolves_by_name_and_rejects_unknown() {
        let registry = StrategyRegistry::default();
        assert_eq!(registry.get("fefo").unwrap().name(), "fefo");
        assert!(matches!(
            registry.get("random"),
            Err(InventoryError::UnknownStrategy(_))
        ));
        assert_eq!(registry.names(), ["fefo", "fifo", "lifo"]);
    }

    #[test]
    fn registry_accepts_runtime_strategies() {
        struct ByNumber;
        impl AllocationStrategy for ByNumber {
            fn name(&self) -> &str {
                "by_number"
            }
            fn order(&self, batches: &mut Vec<Batch>) {
                batches.sort_by(|a, b| a.batch_number.cmp(&b.batch_number));
            }
        }
        let registry = StrategyRegistry::default();
        registry.register(Arc::new(ByNumber));
        assert!(registry.get("by_number").is_ok());
    }
}
