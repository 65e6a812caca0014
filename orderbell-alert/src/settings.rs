//! Alert configuration bridge
//!
//! Loads the persisted [`AlertConfiguration`] once at startup and exposes it
//! as live state through a `watch` channel. Setters clamp, persist, then
//! publish; a persistence failure is logged and the in-memory value stays
//! authoritative.

use crate::error::Result;
use async_trait::async_trait;
use orderbell_common::models::clamp_volume;
use orderbell_common::{AlertConfiguration, SoundProfile};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

/// Persistent storage for the alert configuration
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<AlertConfiguration>;

    async fn save(&self, config: &AlertConfiguration) -> Result<()>;
}

/// Live alert configuration
pub struct AlertSettings {
    store: Arc<dyn SettingsStore>,
    tx: watch::Sender<AlertConfiguration>,
    /// Serializes read-modify-write updates
    update_lock: Mutex<()>,
}

impl AlertSettings {
    /// Load from `store`, falling back to defaults on error
    pub async fn load(store: Arc<dyn SettingsStore>) -> Self {
        let config = match store.load().await {
            Ok(config) => {
                info!(
                    "Alert settings loaded: enabled={}, volume={}%, profile={}, loop={}",
                    config.enabled,
                    config.volume_percent,
                    config.sound_profile,
                    config.keep_ringing_until_acknowledged
                );
                config
            }
            Err(e) => {
                warn!("Failed to load alert settings, using defaults: {}", e);
                AlertConfiguration::default()
            }
        };

        let (tx, _) = watch::channel(config);
        Self {
            store,
            tx,
            update_lock: Mutex::new(()),
        }
    }

    pub fn current(&self) -> AlertConfiguration {
        self.tx.borrow().clone()
    }

    /// Receiver that always sees the latest configuration
    pub fn subscribe(&self) -> watch::Receiver<AlertConfiguration> {
        self.tx.subscribe()
    }

    /// Set volume, clamped to 0..=1000
    pub async fn set_volume(&self, volume: i64) -> AlertConfiguration {
        let volume = clamp_volume(volume);
        self.update(|c| c.volume_percent = volume).await
    }

    pub async fn set_sound_profile(&self, profile: SoundProfile) -> AlertConfiguration {
        self.update(|c| c.sound_profile = profile).await
    }

    pub async fn set_enabled(&self, enabled: bool) -> AlertConfiguration {
        self.update(|c| c.enabled = enabled).await
    }

    pub async fn set_custom_sound_reference(&self, reference: String) -> AlertConfiguration {
        let reference = reference.trim().to_string();
        self.update(move |c| c.custom_sound_reference = reference)
            .await
    }

    pub async fn set_keep_ringing_until_acknowledged(&self, keep_ringing: bool) -> AlertConfiguration {
        self.update(|c| c.keep_ringing_until_acknowledged = keep_ringing)
            .await
    }

    async fn update<F>(&self, apply: F) -> AlertConfiguration
    where
        F: FnOnce(&mut AlertConfiguration),
    {
        let _guard = self.update_lock.lock().await;

        let mut next = self.current();
        apply(&mut next);

        if let Err(e) = self.store.save(&next).await {
            warn!("Failed to persist alert settings (keeping in memory): {}", e);
        }
        self.tx.send_replace(next.clone());
        next
    }
}
