//! Shared domain models
//!
//! Order identifiers, the order record handed to the UI, and the persisted
//! alert configuration consumed by the alert engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Highest accepted alert volume (percent of the device's nominal level)
pub const MAX_VOLUME_PERCENT: u16 = 1000;

/// Opaque order identifier delivered by the order-sync transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(OrderId)
            .map_err(|e| Error::InvalidInput(format!("Invalid order id '{}': {}", s, e)))
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        OrderId(id)
    }
}

/// Order record as stored by the order repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing order number (e.g. "#1042")
    pub number: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_printed: bool,
}

/// Sound profile selected by the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundProfile {
    BuiltinChime,
    BuiltinBell,
    BuiltinCash,
    BuiltinTwoTone,
    BuiltinAlert,
    SystemAlarm,
    SystemRingtone,
    #[default]
    SystemNotification,
    SystemEvent,
    SystemEmail,
    Custom,
}

impl SoundProfile {
    /// All profiles in presentation order
    pub const ALL: [SoundProfile; 11] = [
        SoundProfile::BuiltinChime,
        SoundProfile::BuiltinBell,
        SoundProfile::BuiltinCash,
        SoundProfile::BuiltinTwoTone,
        SoundProfile::BuiltinAlert,
        SoundProfile::SystemAlarm,
        SoundProfile::SystemRingtone,
        SoundProfile::SystemNotification,
        SoundProfile::SystemEvent,
        SoundProfile::SystemEmail,
        SoundProfile::Custom,
    ];

    /// Wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            SoundProfile::BuiltinChime => "builtin-chime",
            SoundProfile::BuiltinBell => "builtin-bell",
            SoundProfile::BuiltinCash => "builtin-cash",
            SoundProfile::BuiltinTwoTone => "builtin-two-tone",
            SoundProfile::BuiltinAlert => "builtin-alert",
            SoundProfile::SystemAlarm => "system-alarm",
            SoundProfile::SystemRingtone => "system-ringtone",
            SoundProfile::SystemNotification => "system-notification",
            SoundProfile::SystemEvent => "system-event",
            SoundProfile::SystemEmail => "system-email",
            SoundProfile::Custom => "custom",
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(
            self,
            SoundProfile::BuiltinChime
                | SoundProfile::BuiltinBell
                | SoundProfile::BuiltinCash
                | SoundProfile::BuiltinTwoTone
                | SoundProfile::BuiltinAlert
        )
    }
}

impl fmt::Display for SoundProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundProfile::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("Unknown sound profile: {}", s)))
    }
}

/// Persisted alert configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfiguration {
    pub enabled: bool,
    /// 0..=1000; values above 100 escalate beyond the device's nominal level
    pub volume_percent: u16,
    pub sound_profile: SoundProfile,
    /// Used when `sound_profile` is `Custom`
    pub custom_sound_reference: String,
    pub keep_ringing_until_acknowledged: bool,
}

impl Default for AlertConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            volume_percent: 70,
            sound_profile: SoundProfile::default(),
            custom_sound_reference: String::new(),
            keep_ringing_until_acknowledged: false,
        }
    }
}

/// Clamp a requested volume into the accepted range
pub fn clamp_volume(volume: i64) -> u16 {
    volume.clamp(0, MAX_VOLUME_PERCENT as i64) as u16
}
