//! Operator control surface
//!
//! Settings changes with their audible feedback (previews), acknowledgement
//! and stop. The HTTP handlers are thin wrappers around this.

use crate::arrival::{AlertCallback, ArrivalCoordinator};
use crate::playback::{AlertPlaybackEngine, TriggerOutcome};
use crate::settings::AlertSettings;
use crate::state::SharedState;
use orderbell_common::events::{AlertEvent, StopReason};
use orderbell_common::{AlertConfiguration, Order, OrderId, SoundProfile};
use std::sync::Arc;
use tracing::{debug, info};

/// Settings and playback control used by the operator UI
#[derive(Clone)]
pub struct AlertControl {
    settings: Arc<AlertSettings>,
    engine: AlertPlaybackEngine,
    coordinator: ArrivalCoordinator,
    state: Arc<SharedState>,
}

impl AlertControl {
    pub fn new(
        settings: Arc<AlertSettings>,
        engine: AlertPlaybackEngine,
        coordinator: ArrivalCoordinator,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            settings,
            engine,
            coordinator,
            state,
        }
    }

    pub fn settings(&self) -> AlertConfiguration {
        self.settings.current()
    }

    /// Set the volume and preview the current profile at the new level
    pub async fn set_volume(&self, volume: i64) -> AlertConfiguration {
        let config = self.settings.set_volume(volume).await;
        self.publish(&config);
        self.preview_sound(None).await;
        config
    }

    /// Switch profile: the current sound stops, then the new profile previews
    ///
    /// A ringing loop is not stopped; the preview replaces its current pass.
    pub async fn set_sound_profile(&self, profile: SoundProfile) -> AlertConfiguration {
        let config = self.settings.set_sound_profile(profile).await;
        self.publish(&config);
        if !self.engine.status().await.is_looping() {
            self.engine.stop().await;
        }
        self.preview_sound(Some(profile)).await;
        config
    }

    /// Enable or disable alerts; enabling previews
    pub async fn set_enabled(&self, enabled: bool) -> AlertConfiguration {
        let config = self.settings.set_enabled(enabled).await;
        self.publish(&config);
        if enabled {
            self.preview_sound(None).await;
        }
        config
    }

    /// Set the custom sound; previews when the custom profile is selected
    pub async fn set_custom_sound_reference(&self, reference: String) -> AlertConfiguration {
        let config = self.settings.set_custom_sound_reference(reference).await;
        self.publish(&config);
        if config.sound_profile == SoundProfile::Custom {
            self.preview_sound(None).await;
        }
        config
    }

    /// Switching ring-until-acknowledged off stops a ringing loop
    pub async fn set_keep_ringing_until_acknowledged(&self, keep_ringing: bool) -> AlertConfiguration {
        let config = self
            .settings
            .set_keep_ringing_until_acknowledged(keep_ringing)
            .await;
        self.publish(&config);
        if !keep_ringing && self.engine.status().await.is_looping() {
            info!("Looping switched off; stopping alert loop");
            self.engine.halt(StopReason::LoopDisabled).await;
        }
        config
    }

    /// One preview pass of `profile`, or of the configured profile
    pub async fn preview_sound(&self, profile: Option<SoundProfile>) -> TriggerOutcome {
        let profile = profile.unwrap_or_else(|| self.settings.current().sound_profile);
        let outcome = self.engine.trigger_test_alert(profile).await;
        debug!("Preview of {}: {:?}", profile, outcome);
        outcome
    }

    /// Operator acknowledged `order_id`; returns whether the order was marked read
    pub async fn acknowledge(&self, order_id: OrderId) -> bool {
        let marked = self.coordinator.mark_acknowledged(order_id).await;
        self.state.broadcast_event(AlertEvent::OrderAcknowledged {
            order_id,
            timestamp: orderbell_common::time::now(),
        });
        marked
    }

    /// Stop all playback; returns whether anything was running
    pub async fn stop_all(&self) -> bool {
        self.engine.halt(StopReason::Stopped).await
    }

    fn publish(&self, config: &AlertConfiguration) {
        self.state.broadcast_event(AlertEvent::SettingsChanged {
            settings: config.clone(),
            timestamp: orderbell_common::time::now(),
        });
    }
}

/// UI callback that forwards alerts to SSE listeners
pub struct EventAlertCallback {
    state: Arc<SharedState>,
}

impl EventAlertCallback {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }
}

impl AlertCallback for EventAlertCallback {
    fn on_alert(&self, order: &Order, batch_count: usize) {
        self.state.record_alert_delivered();
        self.state.broadcast_event(AlertEvent::OrderAlert {
            order_id: order.id,
            order_number: order.number.clone(),
            batch_count,
            timestamp: orderbell_common::time::now(),
        });
    }
}
