//! Shared service state
//!
//! Event fan-out and lightweight counters shared by the coordinator, the
//! engine and the HTTP handlers.

use chrono::{DateTime, Utc};
use orderbell_common::events::{AlertEvent, EventBus};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Event bus capacity; slow SSE clients lag rather than block producers
const EVENT_CAPACITY: usize = 100;

/// Shared state accessible by all components
pub struct SharedState {
    events: EventBus,

    /// Alerts delivered to the UI callback since startup
    alerts_delivered: AtomicU64,

    started_at: DateTime<Utc>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            events: EventBus::new(EVENT_CAPACITY),
            alerts_delivered: AtomicU64::new(0),
            started_at: orderbell_common::time::now(),
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: AlertEvent) {
        // No receivers is OK
        self.events.emit_lossy(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<AlertEvent> {
        self.events.subscribe()
    }

    pub fn record_alert_delivered(&self) {
        self.alerts_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn alerts_delivered(&self) -> u64 {
        self.alerts_delivered.load(Ordering::Relaxed)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime_seconds(&self) -> i64 {
        (orderbell_common::time::now() - self.started_at).num_seconds()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
