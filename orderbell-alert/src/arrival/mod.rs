//! New-order arrival handling
//!
//! Arrivals come in from the order-sync transport (the HTTP ingress in this
//! service), are deduplicated against recently processed ids and batched
//! into a single alert.

pub mod coordinator;
pub mod processed_ids;

pub use coordinator::{ArrivalCoordinator, ArrivalDisposition};
pub use processed_ids::ProcessedIdSet;

use chrono::{DateTime, Utc};
use orderbell_common::{Order, OrderId};

/// One "new order" notification from the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalEvent {
    pub order_id: OrderId,
    pub arrived_at: DateTime<Utc>,
}

impl ArrivalEvent {
    pub fn now(order_id: OrderId) -> Self {
        Self {
            order_id,
            arrived_at: Utc::now(),
        }
    }
}

/// UI-facing alert sink
///
/// Invoked once per batch after playback was triggered. Implementations must
/// not block.
pub trait AlertCallback: Send + Sync {
    fn on_alert(&self, order: &Order, batch_count: usize);
}
