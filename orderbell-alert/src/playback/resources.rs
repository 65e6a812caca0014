//! Sound profile resolution
//!
//! Turns the configured profile (and custom reference) into a concrete
//! [`SoundResource`]. Resolution never fails from the engine's point of view:
//! errors are logged and the default notification sound is used instead.

use crate::device::{SoundResource, SystemSound};
use crate::error::{Error, Result};
use orderbell_common::SoundProfile;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Bundled sound assets by profile
#[derive(Debug, Clone)]
pub struct SoundCatalog {
    assets: HashMap<SoundProfile, String>,
}

impl SoundCatalog {
    /// Catalog without any bundled assets
    pub fn empty() -> Self {
        Self {
            assets: HashMap::new(),
        }
    }

    pub fn with_asset(mut self, profile: SoundProfile, asset: impl Into<String>) -> Self {
        self.assets.insert(profile, asset.into());
        self
    }

    pub fn asset(&self, profile: SoundProfile) -> Option<&str> {
        self.assets.get(&profile).map(String::as_str)
    }
}

impl Default for SoundCatalog {
    fn default() -> Self {
        Self::empty()
            .with_asset(SoundProfile::BuiltinChime, "order_chime")
            .with_asset(SoundProfile::BuiltinBell, "order_bell")
            .with_asset(SoundProfile::BuiltinCash, "order_cash")
            .with_asset(SoundProfile::BuiltinTwoTone, "order_two_tone")
            .with_asset(SoundProfile::BuiltinAlert, "order_alert")
    }
}

/// Resolve a profile to a playable resource
pub fn resolve(
    catalog: &SoundCatalog,
    profile: SoundProfile,
    custom_reference: &str,
) -> Result<SoundResource> {
    match profile {
        SoundProfile::SystemAlarm => Ok(SoundResource::System(SystemSound::Alarm)),
        SoundProfile::SystemRingtone => Ok(SoundResource::System(SystemSound::Ringtone)),
        SoundProfile::SystemNotification | SoundProfile::SystemEvent | SoundProfile::SystemEmail => {
            Ok(SoundResource::System(SystemSound::Notification))
        }
        SoundProfile::Custom => Ok(resolve_custom(custom_reference)),
        builtin => catalog
            .asset(builtin)
            .map(|asset| SoundResource::Builtin(asset.to_string()))
            .ok_or_else(|| Error::Resolution(format!("No bundled asset for {}", builtin))),
    }
}

/// Resolve, falling back to the default notification sound on error
pub fn resolve_or_default(
    catalog: &SoundCatalog,
    profile: SoundProfile,
    custom_reference: &str,
) -> SoundResource {
    match resolve(catalog, profile, custom_reference) {
        Ok(resource) => {
            debug!("Resolved {} to {}", profile, resource);
            resource
        }
        Err(e) => {
            warn!("{}; using default notification sound", e);
            SoundResource::minimal()
        }
    }
}

fn resolve_custom(reference: &str) -> SoundResource {
    let reference = reference.trim();
    if reference.is_empty() {
        debug!("Custom profile without a reference; using default notification sound");
        return SoundResource::minimal();
    }
    if reference.starts_with("content://") || reference.starts_with("file://") {
        SoundResource::Uri(reference.to_string())
    } else {
        SoundResource::File(PathBuf::from(reference))
    }
}
