//! Temporary output-level boost with guaranteed restoration
//!
//! The first `boost()` of a logical alert captures the current level; later
//! calls are no-ops until `restore()` consumes the snapshot. `restore()` is
//! idempotent and is called on every exit path of the engine.

use super::pass::RunGuard;
use super::strategy::{Enhancement, PlaybackStrategy};
use crate::device::AudioDevice;
use crate::error::Result;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

/// Level captured before boosting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSnapshot {
    pub original_level: u32,
    pub boosted_level: u32,
}

/// Owns the shared output level while an alert is boosted
pub struct VolumeBoostController {
    device: Arc<dyn AudioDevice>,
    snapshot: Mutex<Option<VolumeSnapshot>>,
}

impl VolumeBoostController {
    pub fn new(device: Arc<dyn AudioDevice>) -> Self {
        Self {
            device,
            snapshot: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn snapshot(&self) -> Option<VolumeSnapshot> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raise the output level for `strategy` on behalf of `guard`'s run
    ///
    /// Returns `Ok(false)` when a boost is already active, the strategy does
    /// not need one, or the run has been stopped.
    pub fn boost(&self, strategy: &PlaybackStrategy, guard: &RunGuard) -> Result<bool> {
        if !strategy.needs_boost() {
            return Ok(false);
        }

        let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        if snapshot.is_some() || !guard.is_current() {
            return Ok(false);
        }

        let original = self.device.output_level()?;
        let max = self.device.max_output_level()?;
        let ratio = boost_ratio(strategy.volume_percent, strategy.enhancement);
        let target = boost_target(original, max, ratio);

        self.device.set_output_level(target)?;
        *snapshot = Some(VolumeSnapshot {
            original_level: original,
            boosted_level: target,
        });

        info!(
            "Output level boosted {} -> {} (max {}, ratio {:.2})",
            original, target, max, ratio
        );
        Ok(true)
    }

    /// Put the captured level back; no-op when nothing is boosted
    pub fn restore(&self) -> bool {
        let taken = self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.apply_restore(taken)
    }

    /// Restore only if `guard`'s run is still the current one
    pub fn restore_for(&self, guard: &RunGuard) -> bool {
        let taken = {
            let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
            if !guard.is_current() {
                return false;
            }
            snapshot.take()
        };
        self.apply_restore(taken)
    }

    fn apply_restore(&self, taken: Option<VolumeSnapshot>) -> bool {
        let Some(snapshot) = taken else {
            return false;
        };

        match self.device.set_output_level(snapshot.original_level) {
            Ok(()) => debug!("Output level restored to {}", snapshot.original_level),
            Err(e) => error!(
                "Failed to restore output level to {}: {}",
                snapshot.original_level, e
            ),
        }
        true
    }
}

/// Fraction of the headroom above the current level to use
pub fn boost_ratio(volume_percent: u16, enhancement: Enhancement) -> f64 {
    let ratio = match volume_percent {
        v if v >= 1000 => 1.0,
        v if v >= 750 => 0.95,
        v if v >= 500 => 0.85,
        v if v >= 250 => 0.7,
        _ => 0.5,
    };
    if enhancement == Enhancement::None {
        ratio
    } else {
        (ratio * 1.1_f64).min(1.0)
    }
}

/// `original + (max - original) * ratio`, never above `max`
pub fn boost_target(original: u32, max: u32, ratio: f64) -> u32 {
    if original >= max {
        return original;
    }
    let headroom = f64::from(max - original);
    let target = original + (headroom * ratio).round() as u32;
    target.min(max)
}
