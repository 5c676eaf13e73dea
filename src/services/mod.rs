pub mod allocation;
pub mod batch_lifecycle;
pub mod lock_manager;
pub mod movements;
pub mod reservation;
pub mod snapshot;
pub mod stock_operator;
pub mod strategy;

pub use allocation::{AllocationEngine, AllocationLine, AllocationResult};
pub use batch_lifecycle::{BatchLifecycleManager, NewBatch};
pub use lock_manager::{LockManager, LockRequest};
pub use movements::{
    InboundLine, InboundProcessor, InboundRequest, OutboundProcessor, OutboundRequest,
    TransferProcessor, TransferRequest,
};
pub use reservation::{ReservationEngine, ReserveRequest, SweepOutcome};
pub use snapshot::{Snapshot, SnapshotDiff, SnapshotDiffEngine, SkuAggregate, SkuDelta};
pub use stock_operator::StockOperator;
pub use strategy::{AllocationStrategy, Fefo, Fifo, Lifo, StrategyRegistry};
