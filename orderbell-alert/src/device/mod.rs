//! Output device abstraction
//!
//! The alert engine only talks to hardware through [`AudioDevice`]: play a
//! resource (once or N times concurrently), attach loudness/dynamics effects
//! to a device session, read and set the shared output level, and vibrate.
//!
//! Playback completion is reported through oneshot channels. A dropped
//! `ended` sender (e.g. after [`AudioDevice::stop`]) counts as ended.

pub mod simulated;

pub use simulated::{FailureInjection, PlayRecord, SimulatedDevice, SimulatedDeviceConfig};

use crate::error::Result;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::oneshot;
use tracing::debug;

/// Device-assigned audio session id (effects attach to a session)
pub type SessionId = u32;

/// Identifies one playing instance on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

/// Platform-provided sounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemSound {
    Alarm,
    Ringtone,
    Notification,
}

/// A playable sound after profile resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundResource {
    /// Bundled asset by name
    Builtin(String),
    /// Platform default sound of the given kind
    System(SystemSound),
    /// `content://` or `file://` reference, used verbatim
    Uri(String),
    /// Plain filesystem path
    File(PathBuf),
}

impl SoundResource {
    /// Always-available last-resort resource
    pub fn minimal() -> Self {
        SoundResource::System(SystemSound::Notification)
    }
}

impl fmt::Display for SoundResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundResource::Builtin(name) => write!(f, "builtin:{}", name),
            SoundResource::System(kind) => write!(f, "system:{:?}", kind),
            SoundResource::Uri(uri) => f.write_str(uri),
            SoundResource::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// Handle to a started playback instance
#[derive(Debug)]
pub struct PlaybackInstance {
    pub id: InstanceId,
    /// Resolves with the device session id once the instance is prepared
    pub ready: oneshot::Receiver<SessionId>,
    /// Resolves (or closes) when the instance finishes or is stopped
    pub ended: oneshot::Receiver<()>,
}

/// Effects that can be attached to a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// Loudness enhancer with a target gain in millibels
    Loudness,
    /// Dynamics processor (limiter/compressor) that keeps boosted output clean
    Dynamics,
}

/// Device-owned effect attached to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle {
    pub id: u64,
    pub session: SessionId,
    pub kind: EffectKind,
}

/// Vibration waveform: alternating off/on durations plus amplitude
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VibrationPattern {
    pub timings_ms: &'static [u64],
    /// 1..=255
    pub amplitude: u8,
}

impl VibrationPattern {
    pub fn total_duration_ms(&self) -> u64 {
        self.timings_ms.iter().sum()
    }
}

/// Output primitives used by the alert engine
///
/// Implementations must be cheap to call from async code; none of these
/// methods may block on playback completion.
pub trait AudioDevice: Send + Sync {
    /// Start one instance of `resource` at local gain `gain` (0.0..=1.0)
    fn play(&self, resource: &SoundResource, gain: f32) -> Result<PlaybackInstance>;

    /// Start `count` overlapping instances of the same resource
    ///
    /// All or nothing: instances already started are stopped if a later
    /// one fails.
    fn play_concurrent(
        &self,
        resource: &SoundResource,
        count: usize,
        gain: f32,
    ) -> Result<Vec<PlaybackInstance>> {
        let mut instances = Vec::with_capacity(count);
        for _ in 0..count {
            match self.play(resource, gain) {
                Ok(instance) => instances.push(instance),
                Err(e) => {
                    for started in &instances {
                        if let Err(stop_err) = self.stop(started.id) {
                            debug!("Stop of {} treated as done: {}", started.id, stop_err);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(instances)
    }

    /// Stop an instance; stopping an unknown or finished instance is Ok
    fn stop(&self, instance: InstanceId) -> Result<()>;

    fn attach_effect(&self, session: SessionId, kind: EffectKind, gain_mb: i32)
        -> Result<EffectHandle>;

    fn release_effect(&self, handle: EffectHandle) -> Result<()>;

    /// Current shared output level (device units)
    fn output_level(&self) -> Result<u32>;

    fn max_output_level(&self) -> Result<u32>;

    fn set_output_level(&self, level: u32) -> Result<()>;

    fn has_vibrator(&self) -> bool;

    fn vibrate(&self, pattern: &VibrationPattern) -> Result<()>;

    fn cancel_vibration(&self) -> Result<()>;
}
