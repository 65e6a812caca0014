//! Event types for the OrderBell event system
//!
//! Provides the shared `AlertEvent` enum and the `EventBus` used to fan events
//! out to SSE clients and other in-process listeners.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{AlertConfiguration, OrderId, SoundProfile};

/// Why an alert playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Repeat sequence or preview ran to completion
    Completed,
    /// Operator acknowledged the order
    Acknowledged,
    /// Explicit stop request
    Stopped,
    /// A newer alert replaced the running one
    Superseded,
    /// Looping was switched off in the configuration
    LoopDisabled,
    /// Playback task failed unexpectedly; device state was still restored
    Failed,
}

/// How an alert is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMode {
    /// Repeat-escalation sequence
    Sequence,
    /// Ring until acknowledged
    Looping,
    /// Single preview pass from the settings screen
    Preview,
}

/// OrderBell event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlertEvent {
    /// One alert for a batch of newly arrived orders
    ///
    /// Carries the representative (most recently created) order and the
    /// number of arrivals collapsed into this alert.
    OrderAlert {
        order_id: OrderId,
        order_number: String,
        batch_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Alert playback started
    AlertPlaybackStarted {
        mode: AlertMode,
        profile: SoundProfile,
        volume_percent: u16,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Alert playback ended and device state was restored
    AlertPlaybackStopped {
        reason: StopReason,
        passes_completed: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Operator acknowledged an order
    OrderAcknowledged {
        order_id: OrderId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Alert configuration changed
    SettingsChanged {
        settings: AlertConfiguration,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AlertEvent {
    /// Get event type as string for filtering and SSE event names
    pub fn event_type(&self) -> &'static str {
        match self {
            AlertEvent::OrderAlert { .. } => "OrderAlert",
            AlertEvent::AlertPlaybackStarted { .. } => "AlertPlaybackStarted",
            AlertEvent::AlertPlaybackStopped { .. } => "AlertPlaybackStopped",
            AlertEvent::OrderAcknowledged { .. } => "OrderAcknowledged",
            AlertEvent::SettingsChanged { .. } => "SettingsChanged",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AlertEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AlertEvent,
    ) -> Result<usize, broadcast::error::SendError<AlertEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AlertEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
