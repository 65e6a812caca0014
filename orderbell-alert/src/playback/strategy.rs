//! Volume-tier playback strategy selection
//!
//! One pure mapping from the configured volume percentage to layer count,
//! enhancement level, repeat count and vibration. Used by both the alert and
//! the preview paths.

use crate::device::VibrationPattern;
use serde::Serialize;

/// Loudness processing applied to each instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Enhancement {
    None,
    /// Loudness enhancer only
    Basic,
    /// Loudness enhancer plus dynamics processor
    Full,
}

/// How one logical alert is played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStrategy {
    pub volume_percent: u16,
    /// Concurrent instances of the same sound
    pub layer_count: usize,
    pub enhancement: Enhancement,
    /// Passes per non-looping alert
    pub repeat_count: u32,
    pub vibration: Option<VibrationPattern>,
}

impl PlaybackStrategy {
    /// Whether the shared output level must be raised
    pub fn needs_boost(&self) -> bool {
        self.volume_percent > 100
    }

    /// Effects attach when enhancement is on or the volume exceeds nominal
    pub fn effects_enabled(&self) -> bool {
        self.enhancement != Enhancement::None || self.volume_percent > 100
    }

    /// Per-instance gain: proportional up to 100 %, full above
    pub fn instance_gain(&self) -> f32 {
        if self.volume_percent <= 100 {
            f32::from(self.volume_percent) / 100.0
        } else {
            1.0
        }
    }

    /// Loudness enhancer target gain in millibels
    pub fn loudness_gain_mb(&self) -> i32 {
        match self.volume_percent {
            v if v >= 1000 => 3000,
            v if v >= 750 => 2500,
            v if v >= 500 => 2000,
            _ => 1500,
        }
    }
}

/// Map a volume percentage to its playback strategy
pub fn select_strategy(volume_percent: u16) -> PlaybackStrategy {
    let (layer_count, enhancement, repeat_count) = match volume_percent {
        v if v >= 1000 => (3, Enhancement::Full, 2),
        v if v >= 750 => (2, Enhancement::Full, 2),
        v if v >= 500 => (1, Enhancement::Full, 2),
        v if v >= 250 => (1, Enhancement::Basic, 1),
        _ => (1, Enhancement::None, 1),
    };

    PlaybackStrategy {
        volume_percent,
        layer_count,
        enhancement,
        repeat_count,
        vibration: vibration_pattern(volume_percent),
    }
}

/// Vibration for a volume tier; `None` below 50 %
pub fn vibration_pattern(volume_percent: u16) -> Option<VibrationPattern> {
    let (timings_ms, amplitude): (&'static [u64], u8) = match volume_percent {
        v if v >= 1000 => (&[0, 1000, 300, 800, 300, 600, 300, 800, 300, 1000], 255),
        v if v >= 750 => (&[0, 800, 300, 600, 200, 400, 200, 600], 230),
        v if v >= 500 => (&[0, 600, 250, 500, 200, 400], 200),
        v if v >= 250 => (&[0, 400, 200, 400], 150),
        v if v >= 100 => (&[0, 300, 150, 300], 120),
        v if v >= 50 => (&[0, 200], 80),
        _ => return None,
    };
    Some(VibrationPattern {
        timings_ms,
        amplitude,
    })
}
