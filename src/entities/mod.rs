pub mod batch;
pub mod movement;
pub mod reservation;
pub mod stock_lock;

pub use batch::{Batch, BatchStatus, QualityLevel, Sku};
pub use movement::{
    AllocatedLine, MovementDirection, MovementKind, MovementRecord, RequestedLine,
};
pub use reservation::{Reservation, ReservationKind, ReservationLine, ReservationStatus};
pub use stock_lock::{LockLine, LockStatus, StockLock};
