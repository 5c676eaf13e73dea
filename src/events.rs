use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::entities::Sku;

/// Domain events emitted by the inventory core. Consumers (alerting,
/// admin display, reporting) subscribe at the channel boundary; delivery
/// beyond the channel is out of scope here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BatchCreated {
        batch_number: String,
        sku: Sku,
        quantity: i64,
    },
    BatchesMerged {
        sources: Vec<String>,
        merged_batch_number: String,
        quantity: i64,
    },
    BatchSplit {
        source_batch_number: String,
        new_batch_number: String,
        quantity: i64,
    },
    BatchAdjusted {
        batch_number: String,
        delta: i64,
        new_quantity: i64,
    },
    BatchStatusChanged {
        batch_number: String,
        old_status: String,
        new_status: String,
    },
    StockReserved {
        reservation_id: Uuid,
        business_id: String,
        sku: Sku,
        quantity: i64,
    },
    ReservationConfirmed {
        reservation_id: Uuid,
        business_id: String,
        quantity: i64,
    },
    ReservationReleased {
        reservation_id: Uuid,
        business_id: String,
        reason: String,
    },
    ReservationsExpired {
        processed: u64,
        swept_at: DateTime<Utc>,
    },
    StockLocked {
        lock_id: Uuid,
        quantity: i64,
        reason: String,
    },
    StockUnlocked {
        lock_id: Uuid,
    },
    InboundReceived {
        reference_id: String,
        total_quantity: i64,
    },
    OutboundShipped {
        reference_id: String,
        total_quantity: i64,
    },
    StockTransferred {
        reference_id: String,
        sku: Sku,
        quantity: i64,
        from_location: String,
        to_location: String,
    },
}

/// Async event dispatcher shared by all services.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with its receiving half, sized by the
    /// configured channel capacity.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_round_trip_through_the_channel() {
        let (sender, mut rx) = EventSender::channel(4);
        sender
            .send(Event::BatchCreated {
                batch_number: "B-1".into(),
                sku: Sku::new("SKU-1"),
                quantity: 10,
            })
            .await
            .unwrap();
        match rx.recv().await {
            Some(Event::BatchCreated { batch_number, .. }) => assert_eq!(batch_number, "B-1"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_dropped() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        assert!(sender
            .send(Event::StockUnlocked {
                lock_id: Uuid::new_v4()
            })
            .await
            .is_err());
    }
}
