//! orderbell-alert specific configuration

use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP port for the alert service
pub const DEFAULT_PORT: u16 = 5810;

/// Service configuration resolved in `main`
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub playback: PlaybackTimings,
    pub coordinator: CoordinatorConfig,
}

/// Timing parameters of the playback engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTimings {
    /// Pause between passes of a repeat sequence
    pub repeat_delay: Duration,
    /// Wait after the final pass before the output level is restored
    pub restore_grace: Duration,
    /// Interval between loop iteration starts
    pub loop_cadence: Duration,
    /// Upper bound on a single pass
    pub pass_timeout: Duration,
    /// How long to wait for a device session id before skipping effects
    pub ready_timeout: Duration,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            repeat_delay: Duration::from_millis(1000),
            restore_grace: Duration::from_millis(1000),
            loop_cadence: Duration::from_millis(4000),
            pass_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(2),
        }
    }
}

/// Arrival coordinator parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Batching window
    pub batch_delay: Duration,
    /// Arrivals within this window after start are recorded but never alerted.
    /// Zero disables the window.
    pub startup_quiet: Duration,
    /// Processed-id trim interval
    pub maintenance_interval: Duration,
    /// Processed-id set capacity
    pub processed_cap: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_millis(300),
            startup_quiet: Duration::ZERO,
            maintenance_interval: Duration::from_secs(15 * 60),
            processed_cap: 500,
        }
    }
}
