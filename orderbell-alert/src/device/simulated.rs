//! Simulated output device
//!
//! Stands in for real audio hardware: instances "play" for a fixed clip
//! duration on a tokio timer, the output level lives in memory, and every
//! call is recorded so tests (and the `/alerts/status` endpoint) can inspect
//! what the engine did. Failure injection lets tests drive the fallback chain.
//!
//! `play` spawns a timer task and must be called from within a tokio runtime.

use super::{
    AudioDevice, EffectHandle, EffectKind, InstanceId, PlaybackInstance, SessionId, SoundResource,
    VibrationPattern,
};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Timing and capability parameters of the simulated device
#[derive(Debug, Clone, Copy)]
pub struct SimulatedDeviceConfig {
    /// How long each instance plays before it ends on its own
    pub clip_duration: Duration,
    /// Delay before an instance reports its session id
    pub ready_delay: Duration,
    pub initial_level: u32,
    pub max_level: u32,
    pub has_vibrator: bool,
}

impl Default for SimulatedDeviceConfig {
    fn default() -> Self {
        Self {
            clip_duration: Duration::from_millis(1500),
            ready_delay: Duration::from_millis(20),
            initial_level: 7,
            max_level: 15,
            has_vibrator: true,
        }
    }
}

/// Which primitives should fail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureInjection {
    /// `play_concurrent` with more than one instance fails
    pub fail_concurrent: bool,
    /// Every non-system resource fails to play
    pub fail_non_system: bool,
    /// Every play fails, including the minimal system sound
    pub fail_all_play: bool,
    /// `attach_effect` fails
    pub fail_effects: bool,
    /// `release_effect` fails (the effect is still dropped)
    pub fail_release: bool,
    /// `set_output_level` fails
    pub fail_set_level: bool,
    /// `play` panics
    pub panic_on_play: bool,
}

/// One recorded `play` call that produced an instance
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRecord {
    pub instance: InstanceId,
    pub resource: SoundResource,
    pub gain: f32,
    /// Number of instances started by the same call
    pub concurrent: usize,
}

#[derive(Default)]
struct SimState {
    level: u32,
    level_history: Vec<u32>,
    plays: Vec<PlayRecord>,
    active: HashMap<InstanceId, oneshot::Sender<()>>,
    effects: HashSet<u64>,
    effects_attached: Vec<EffectHandle>,
    vibrations: Vec<VibrationPattern>,
    vibration_cancels: usize,
}

/// In-memory [`AudioDevice`]
pub struct SimulatedDevice {
    config: SimulatedDeviceConfig,
    state: Arc<Mutex<SimState>>,
    failures: Mutex<FailureInjection>,
    next_instance: AtomicU64,
    next_session: AtomicU32,
    next_effect: AtomicU64,
}

impl SimulatedDevice {
    pub fn new(config: SimulatedDeviceConfig) -> Self {
        let state = SimState {
            level: config.initial_level.min(config.max_level),
            ..Default::default()
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
            failures: Mutex::new(FailureInjection::default()),
            next_instance: AtomicU64::new(1),
            next_session: AtomicU32::new(100),
            next_effect: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &SimulatedDeviceConfig {
        &self.config
    }

    pub fn set_failures(&self, failures: FailureInjection) {
        *self.failures.lock().unwrap_or_else(PoisonError::into_inner) = failures;
    }

    fn failures(&self) -> FailureInjection {
        *self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        lock_state(&self.state)
    }

    /// Every play call that started instances, in order
    pub fn plays(&self) -> Vec<PlayRecord> {
        self.state().plays.clone()
    }

    /// Number of distinct play calls (a concurrent call counts once)
    pub fn pass_count(&self) -> usize {
        let state = self.state();
        let mut count = 0;
        let mut remaining = 0;
        for record in &state.plays {
            if remaining == 0 {
                count += 1;
                remaining = record.concurrent;
            }
            remaining -= 1;
        }
        count
    }

    pub fn active_instances(&self) -> usize {
        self.state().active.len()
    }

    pub fn active_effects(&self) -> usize {
        self.state().effects.len()
    }

    /// Every effect ever attached
    pub fn effects_attached(&self) -> Vec<EffectHandle> {
        self.state().effects_attached.clone()
    }

    pub fn vibrations(&self) -> Vec<VibrationPattern> {
        self.state().vibrations.clone()
    }

    pub fn vibration_cancels(&self) -> usize {
        self.state().vibration_cancels
    }

    /// Every level written through `set_output_level`
    pub fn level_history(&self) -> Vec<u32> {
        self.state().level_history.clone()
    }

    pub fn current_level(&self) -> u32 {
        self.state().level
    }

    /// Change the level as a user would, bypassing history
    pub fn set_level_externally(&self, level: u32) {
        self.state().level = level.min(self.config.max_level);
    }

    fn start_instance(&self, resource: &SoundResource, gain: f32, concurrent: usize) -> PlaybackInstance {
        let id = InstanceId(self.next_instance.fetch_add(1, Ordering::Relaxed));
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (ended_tx, ended_rx) = oneshot::channel();

        {
            let mut state = self.state();
            state.plays.push(PlayRecord {
                instance: id,
                resource: resource.clone(),
                gain,
                concurrent,
            });
            state.active.insert(id, ended_tx);
        }

        let shared = Arc::clone(&self.state);
        let ready_delay = self.config.ready_delay;
        let clip_duration = self.config.clip_duration;
        tokio::spawn(async move {
            tokio::time::sleep(ready_delay).await;
            let _ = ready_tx.send(session);

            tokio::time::sleep(clip_duration).await;
            let sender = lock_state(&shared).active.remove(&id);
            if let Some(sender) = sender {
                let _ = sender.send(());
            }
        });

        debug!("Simulated play {} of {} at gain {:.2}", id, resource, gain);
        PlaybackInstance {
            id,
            ready: ready_rx,
            ended: ended_rx,
        }
    }

    fn check_play(&self, resource: &SoundResource) -> Result<()> {
        let failures = self.failures();
        if failures.panic_on_play {
            panic!("simulated device panic while playing {}", resource);
        }
        if failures.fail_all_play {
            return Err(Error::Device(format!("playback unavailable for {}", resource)));
        }
        if failures.fail_non_system && !matches!(resource, SoundResource::System(_)) {
            return Err(Error::Device(format!("cannot open {}", resource)));
        }
        Ok(())
    }
}

fn lock_state(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AudioDevice for SimulatedDevice {
    fn play(&self, resource: &SoundResource, gain: f32) -> Result<PlaybackInstance> {
        self.check_play(resource)?;
        Ok(self.start_instance(resource, gain.clamp(0.0, 1.0), 1))
    }

    fn play_concurrent(
        &self,
        resource: &SoundResource,
        count: usize,
        gain: f32,
    ) -> Result<Vec<PlaybackInstance>> {
        self.check_play(resource)?;
        if count > 1 && self.failures().fail_concurrent {
            return Err(Error::Device(format!(
                "cannot start {} concurrent instances",
                count
            )));
        }
        let gain = gain.clamp(0.0, 1.0);
        Ok((0..count)
            .map(|_| self.start_instance(resource, gain, count))
            .collect())
    }

    fn stop(&self, instance: InstanceId) -> Result<()> {
        // Dropping the sender closes `ended`
        self.state().active.remove(&instance);
        Ok(())
    }

    fn attach_effect(
        &self,
        session: SessionId,
        kind: EffectKind,
        _gain_mb: i32,
    ) -> Result<EffectHandle> {
        if self.failures().fail_effects {
            return Err(Error::Device(format!(
                "{:?} effect unsupported on session {}",
                kind, session
            )));
        }
        let handle = EffectHandle {
            id: self.next_effect.fetch_add(1, Ordering::Relaxed),
            session,
            kind,
        };
        let mut state = self.state();
        state.effects.insert(handle.id);
        state.effects_attached.push(handle);
        Ok(handle)
    }

    fn release_effect(&self, handle: EffectHandle) -> Result<()> {
        let removed = self.state().effects.remove(&handle.id);
        if self.failures().fail_release {
            return Err(Error::Device(format!("release of effect {} failed", handle.id)));
        }
        if !removed {
            return Err(Error::Device(format!("effect {} already released", handle.id)));
        }
        Ok(())
    }

    fn output_level(&self) -> Result<u32> {
        Ok(self.state().level)
    }

    fn max_output_level(&self) -> Result<u32> {
        Ok(self.config.max_level)
    }

    fn set_output_level(&self, level: u32) -> Result<()> {
        if self.failures().fail_set_level {
            return Err(Error::Device("output level is locked".to_string()));
        }
        let mut state = self.state();
        state.level = level.min(self.config.max_level);
        let level = state.level;
        state.level_history.push(level);
        Ok(())
    }

    fn has_vibrator(&self) -> bool {
        self.config.has_vibrator
    }

    fn vibrate(&self, pattern: &VibrationPattern) -> Result<()> {
        if !self.config.has_vibrator {
            return Err(Error::Device("no vibrator".to_string()));
        }
        self.state().vibrations.push(*pattern);
        Ok(())
    }

    fn cancel_vibration(&self) -> Result<()> {
        self.state().vibration_cancels += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SystemSound;

    fn fast_config() -> SimulatedDeviceConfig {
        SimulatedDeviceConfig {
            clip_duration: Duration::from_millis(30),
            ready_delay: Duration::from_millis(5),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_instance_reports_ready_then_ended() {
        let device = SimulatedDevice::new(fast_config());
        let instance = device
            .play(&SoundResource::Builtin("chime".into()), 0.5)
            .unwrap();

        let session = instance.ready.await.unwrap();
        assert!(session >= 100);
        assert!(instance.ended.await.is_ok());
        assert_eq!(device.active_instances(), 0);
        assert_eq!(device.plays()[0].gain, 0.5);
    }

    #[tokio::test]
    async fn test_stop_closes_ended_channel() {
        let device = SimulatedDevice::new(SimulatedDeviceConfig {
            clip_duration: Duration::from_secs(5),
            ..fast_config()
        });
        let instance = device.play(&SoundResource::minimal(), 1.0).unwrap();
        device.stop(instance.id).unwrap();

        assert!(instance.ended.await.is_err());
        assert_eq!(device.active_instances(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_counts_as_one_pass() {
        let device = SimulatedDevice::new(fast_config());
        let instances = device
            .play_concurrent(&SoundResource::Builtin("bell".into()), 3, 1.0)
            .unwrap();
        assert_eq!(instances.len(), 3);
        device.play(&SoundResource::minimal(), 1.0).unwrap();

        assert_eq!(device.plays().len(), 4);
        assert_eq!(device.pass_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let device = SimulatedDevice::new(fast_config());
        device.set_failures(FailureInjection {
            fail_non_system: true,
            fail_concurrent: true,
            ..Default::default()
        });

        assert!(device.play(&SoundResource::Builtin("cash".into()), 1.0).is_err());
        assert!(device
            .play_concurrent(&SoundResource::System(SystemSound::Alarm), 2, 1.0)
            .is_err());
        assert!(device.play(&SoundResource::minimal(), 1.0).is_ok());
    }

    #[test]
    fn test_output_level_is_clamped_and_recorded() {
        let device = SimulatedDevice::new(SimulatedDeviceConfig::default());
        assert_eq!(device.output_level().unwrap(), 7);

        device.set_output_level(99).unwrap();
        assert_eq!(device.output_level().unwrap(), 15);
        assert_eq!(device.level_history(), vec![15]);
    }

    #[test]
    fn test_effect_release_twice_is_error() {
        let device = SimulatedDevice::new(SimulatedDeviceConfig::default());
        let handle = device.attach_effect(101, EffectKind::Loudness, 2000).unwrap();
        assert_eq!(device.active_effects(), 1);

        device.release_effect(handle).unwrap();
        assert!(device.release_effect(handle).is_err());
        assert_eq!(device.active_effects(), 0);
    }
}
