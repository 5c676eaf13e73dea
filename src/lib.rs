//! Batchstock
//!
//! A batch-level inventory core answering, under concurrent demand,
//! "how much can I promise now, and from which batches?". It covers
//! allocation planning over per-SKU batches (FIFO/LIFO/FEFO), the
//! reservation state machine that turns a tentative hold into a committed
//! deduction, operational locks, batch lifecycle (create/merge/split/
//! adjust), movement processors with audit records, and snapshot diffs.
//!
//! Persistence lives behind the traits in [`store`]; the crate ships an
//! in-memory reference implementation. Transport, admin surfaces, and
//! alerting delivery are integration points outside this crate.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod services;
pub mod store;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::events::{Event, EventSender};
use crate::services::allocation::AllocationEngine;
use crate::services::batch_lifecycle::BatchLifecycleManager;
use crate::services::lock_manager::LockManager;
use crate::services::movements::{InboundProcessor, OutboundProcessor, TransferProcessor};
use crate::services::reservation::ReservationEngine;
use crate::services::snapshot::SnapshotDiffEngine;
use crate::services::stock_operator::StockOperator;
use crate::services::strategy::StrategyRegistry;
use crate::store::InventoryStore;

/// Fully wired inventory core over one store.
///
/// Convenience assembly for embedders and tests; each service can also be
/// constructed individually against the store traits it needs.
pub struct InventoryCore<S> {
    pub config: EngineConfig,
    pub event_sender: EventSender,
    pub strategies: StrategyRegistry,
    pub allocation: AllocationEngine<S>,
    pub lifecycle: BatchLifecycleManager<S>,
    pub stock: StockOperator<S>,
    pub reservations: ReservationEngine<S>,
    pub locks: LockManager<S>,
    pub inbound: InboundProcessor<S>,
    pub outbound: OutboundProcessor<S>,
    pub transfers: TransferProcessor<S>,
    pub snapshots: SnapshotDiffEngine,
}

impl<S: InventoryStore> InventoryCore<S> {
    /// Wires every service against one shared store, returning the core
    /// together with the receiving half of the event channel.
    pub fn new(
        store: Arc<S>,
        config: EngineConfig,
    ) -> (Self, tokio::sync::mpsc::Receiver<Event>) {
        let (event_sender, events) = EventSender::channel(config.event_channel_capacity);
        let strategies = StrategyRegistry::default();

        let allocation = AllocationEngine::new(store.clone(), strategies.clone());
        let stock = StockOperator::new(store.clone());
        let lifecycle = BatchLifecycleManager::new(store.clone(), event_sender.clone());
        let reservations = ReservationEngine::new(
            store.clone(),
            allocation.clone(),
            stock.clone(),
            event_sender.clone(),
            config.clone(),
        );
        let locks = LockManager::new(store.clone(), stock.clone(), event_sender.clone());
        let inbound = InboundProcessor::new(store.clone(), lifecycle.clone(), event_sender.clone());
        let outbound = OutboundProcessor::new(
            store.clone(),
            allocation.clone(),
            stock.clone(),
            event_sender.clone(),
            config.clone(),
        );
        let transfers = TransferProcessor::new(
            store,
            allocation.clone(),
            stock.clone(),
            event_sender.clone(),
            config.clone(),
        );

        (
            Self {
                config,
                event_sender,
                strategies,
                allocation,
                lifecycle,
                stock,
                reservations,
                locks,
                inbound,
                outbound,
                transfers,
                snapshots: SnapshotDiffEngine::new(),
            },
            events,
        )
    }
}
