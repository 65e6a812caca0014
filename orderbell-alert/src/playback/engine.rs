//! Alert playback engine - sequencing and lifecycle
//!
//! **Responsibilities:**
//! - Turn a trigger into a run: repeat sequence, ring-until-acknowledged loop,
//!   or single preview pass
//! - Own the shared device state for the duration of a run (session, effects,
//!   output boost) and give it back on every exit path
//! - Acknowledge/stop from any task, effective immediately
//!
//! A preview while a loop rings is handed to the loop task: it replaces the
//! pass in flight and the loop carries on.
//!
//! Each run carries a generation number. `stop()`, `acknowledge()` and a
//! superseding trigger bump the generation under the core lock and clean up
//! synchronously; the old task then finds its guard stale and leaves engine
//! state alone.

use super::effects::EffectRegistry;
use super::pass::{PassEnd, PassReport, PassRunner, RunGuard};
use super::resources::{resolve_or_default, SoundCatalog};
use super::session::{SessionSlot, SessionState};
use super::strategy::{select_strategy, PlaybackStrategy};
use super::volume_boost::VolumeBoostController;
use super::AlertTrigger;
use crate::config::PlaybackTimings;
use crate::device::{AudioDevice, SoundResource};
use crate::state::SharedState;
use async_trait::async_trait;
use futures::FutureExt;
use orderbell_common::events::{AlertEvent, AlertMode, StopReason};
use orderbell_common::{AlertConfiguration, Order, SoundProfile};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Previews waiting for a ringing loop to play them
const LOOP_PREVIEW_QUEUE: usize = 4;

/// Where the engine is in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Idle,
    Resolving,
    Playing,
    /// Between passes (repeat delay or loop cadence wait)
    RepeatPending,
}

/// Ring-until-acknowledged state, orthogonal to the phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopState {
    Inactive,
    Active { profile: SoundProfile },
}

/// What a trigger did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started(AlertMode),
    /// A loop is already ringing; it keeps going unchanged
    AlreadyLooping,
    /// Alerts are disabled in the configuration
    Disabled,
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub phase: EnginePhase,
    pub loop_state: LoopState,
    pub mode: Option<AlertMode>,
    pub boost_active: bool,
    pub session_state: SessionState,
    pub passes_completed: u32,
    pub generation: u64,
}

impl EngineStatus {
    pub fn is_idle(&self) -> bool {
        self.phase == EnginePhase::Idle && self.loop_state == LoopState::Inactive
    }

    pub fn is_looping(&self) -> bool {
        matches!(self.loop_state, LoopState::Active { .. })
    }
}

struct EngineCore {
    phase: EnginePhase,
    loop_state: LoopState,
    mode: Option<AlertMode>,
    run: Option<CancellationToken>,
    passes_completed: u32,
    /// Set while a loop rings
    loop_previews: Option<mpsc::Sender<SoundProfile>>,
}

struct EngineInner {
    device: Arc<dyn AudioDevice>,
    settings: watch::Receiver<AlertConfiguration>,
    catalog: SoundCatalog,
    timings: PlaybackTimings,
    boost: Arc<VolumeBoostController>,
    effects: Arc<EffectRegistry>,
    sessions: Arc<SessionSlot>,
    runner: PassRunner,
    state: Arc<SharedState>,
    generation: Arc<AtomicU64>,
    core: Mutex<EngineCore>,
}

/// Alert playback engine
///
/// Cheap to clone; all clones drive the same engine.
#[derive(Clone)]
pub struct AlertPlaybackEngine {
    inner: Arc<EngineInner>,
}

impl AlertPlaybackEngine {
    pub fn new(
        device: Arc<dyn AudioDevice>,
        settings: watch::Receiver<AlertConfiguration>,
        catalog: SoundCatalog,
        timings: PlaybackTimings,
        state: Arc<SharedState>,
    ) -> Self {
        let effects = Arc::new(EffectRegistry::new(device.clone()));
        let sessions = Arc::new(SessionSlot::new(device.clone(), effects.clone()));
        let boost = Arc::new(VolumeBoostController::new(device.clone()));
        let runner = PassRunner::new(
            device.clone(),
            sessions.clone(),
            boost.clone(),
            timings,
        );

        Self {
            inner: Arc::new(EngineInner {
                device,
                settings,
                catalog,
                timings,
                boost,
                effects,
                sessions,
                runner,
                state,
                generation: Arc::new(AtomicU64::new(0)),
                core: Mutex::new(EngineCore {
                    phase: EnginePhase::Idle,
                    loop_state: LoopState::Inactive,
                    mode: None,
                    run: None,
                    passes_completed: 0,
                    loop_previews: None,
                }),
            }),
        }
    }

    /// Alert with `profile` using the live configuration
    ///
    /// Loops until acknowledged when the configuration asks for it,
    /// otherwise runs one repeat sequence. A trigger while a loop is ringing
    /// leaves the loop alone.
    pub async fn trigger_alert(&self, profile: SoundProfile) -> TriggerOutcome {
        self.start(profile, false).await
    }

    /// Single preview pass of `profile`; never repeats or loops
    ///
    /// While a loop rings the preview replaces the loop's current pass and
    /// the loop keeps ringing afterwards.
    pub async fn trigger_test_alert(&self, profile: SoundProfile) -> TriggerOutcome {
        self.start(profile, true).await
    }

    /// Operator acknowledged the order: stop everything
    pub async fn acknowledge(&self) -> bool {
        self.halt(StopReason::Acknowledged).await
    }

    /// Stop everything (idempotent)
    pub async fn stop(&self) -> bool {
        self.halt(StopReason::Stopped).await
    }

    /// Cancel any run and release every device resource
    ///
    /// Returns whether anything was running.
    pub async fn halt(&self, reason: StopReason) -> bool {
        let mut core = self.inner.core.lock().await;
        self.halt_locked(&mut core, reason)
    }

    pub async fn status(&self) -> EngineStatus {
        let core = self.inner.core.lock().await;
        EngineStatus {
            phase: core.phase,
            loop_state: core.loop_state,
            mode: core.mode,
            boost_active: self.inner.boost.is_active(),
            session_state: self.inner.sessions.state(),
            passes_completed: core.passes_completed,
            generation: self.inner.generation.load(Ordering::SeqCst),
        }
    }

    async fn start(&self, profile: SoundProfile, preview: bool) -> TriggerOutcome {
        let config = self.inner.settings.borrow().clone();
        if !config.enabled {
            debug!("Alerts disabled; ignoring trigger for {}", profile);
            return TriggerOutcome::Disabled;
        }

        let mode = if preview {
            AlertMode::Preview
        } else if config.keep_ringing_until_acknowledged {
            AlertMode::Looping
        } else {
            AlertMode::Sequence
        };

        let mut core = self.inner.core.lock().await;
        if matches!(core.loop_state, LoopState::Active { .. }) {
            if !preview {
                info!("Loop already ringing; keeping it");
                return TriggerOutcome::AlreadyLooping;
            }
            if let Some(previews) = &core.loop_previews {
                match previews.try_send(profile) {
                    Ok(()) => {
                        info!("Previewing {} inside the ringing loop", profile);
                        return TriggerOutcome::Started(AlertMode::Preview);
                    }
                    Err(TrySendError::Full(_)) => {
                        debug!("Loop preview queue full; dropping preview of {}", profile);
                        return TriggerOutcome::Started(AlertMode::Preview);
                    }
                    Err(TrySendError::Closed(_)) => debug!("Loop task gone; starting a fresh preview"),
                }
            }
        }
        if core.run.is_some() {
            self.halt_locked(&mut core, StopReason::Superseded);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let (preview_tx, preview_rx) = mpsc::channel(LOOP_PREVIEW_QUEUE);
        core.run = Some(token.clone());
        core.loop_previews = (mode == AlertMode::Looping).then_some(preview_tx);
        core.phase = EnginePhase::Resolving;
        core.mode = Some(mode);
        core.passes_completed = 0;
        core.loop_state = if mode == AlertMode::Looping {
            LoopState::Active { profile }
        } else {
            LoopState::Inactive
        };
        drop(core);

        info!(
            "Alert started: {:?} with {} at {}%",
            mode, profile, config.volume_percent
        );
        self.inner.state.broadcast_event(AlertEvent::AlertPlaybackStarted {
            mode,
            profile,
            volume_percent: config.volume_percent,
            timestamp: orderbell_common::time::now(),
        });

        let guard = RunGuard::new(self.inner.generation.clone(), generation);
        let engine = self.clone();
        tokio::spawn(async move {
            engine
                .run(guard, token, profile, config, mode, preview_rx)
                .await;
        });

        TriggerOutcome::Started(mode)
    }

    async fn run(
        &self,
        guard: RunGuard,
        token: CancellationToken,
        profile: SoundProfile,
        config: AlertConfiguration,
        mode: AlertMode,
        previews: mpsc::Receiver<SoundProfile>,
    ) {
        let work = async {
            let resource =
                resolve_or_default(&self.inner.catalog, profile, &config.custom_sound_reference);
            let strategy = select_strategy(config.volume_percent);
            debug!(
                "Strategy for {}%: {} layer(s), {:?}, {} pass(es)",
                strategy.volume_percent,
                strategy.layer_count,
                strategy.enhancement,
                strategy.repeat_count
            );

            match mode {
                AlertMode::Looping => {
                    self.run_loop(&guard, &token, &resource, &strategy, previews)
                        .await
                }
                AlertMode::Sequence => {
                    self.run_sequence(&guard, &token, &resource, &strategy, strategy.repeat_count)
                        .await
                }
                AlertMode::Preview => {
                    self.run_sequence(&guard, &token, &resource, &strategy, 1)
                        .await
                }
            }
        };

        let reason = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Some(reason)) => reason,
            // Cancelled: whoever cancelled already cleaned up
            Ok(None) => return,
            Err(_) => {
                error!("Alert playback task panicked; restoring device state");
                StopReason::Failed
            }
        };

        self.finish_run(&guard, reason).await;
    }

    async fn run_sequence(
        &self,
        guard: &RunGuard,
        token: &CancellationToken,
        resource: &SoundResource,
        strategy: &PlaybackStrategy,
        passes: u32,
    ) -> Option<StopReason> {
        for pass in 1..=passes {
            self.set_phase(guard, EnginePhase::Playing).await;
            let report = self
                .inner
                .runner
                .run_pass(resource, strategy, guard, token)
                .await;
            if report.end == PassEnd::Cancelled {
                return None;
            }
            self.record_pass(guard).await;
            debug!("Pass {}/{} done via {:?}", pass, passes, report.attempt);

            if pass < passes {
                self.set_phase(guard, EnginePhase::RepeatPending).await;
                if !pause(token, self.inner.timings.repeat_delay).await {
                    return None;
                }
            }
        }

        if !pause(token, self.inner.timings.restore_grace).await {
            return None;
        }
        Some(StopReason::Completed)
    }

    async fn run_loop(
        &self,
        guard: &RunGuard,
        token: &CancellationToken,
        resource: &SoundResource,
        strategy: &PlaybackStrategy,
        mut previews: mpsc::Receiver<SoundProfile>,
    ) -> Option<StopReason> {
        let cadence = self.inner.timings.loop_cadence;
        let mut iteration: u32 = 0;

        loop {
            let started = Instant::now();
            if token.is_cancelled() {
                return None;
            }
            if !self.inner.settings.borrow().keep_ringing_until_acknowledged {
                info!("Ring-until-acknowledged switched off; ending loop");
                return Some(StopReason::LoopDisabled);
            }

            iteration += 1;
            self.set_phase(guard, EnginePhase::Playing).await;

            let pass = AssertUnwindSafe(self.inner.runner.run_pass(resource, strategy, guard, token))
                .catch_unwind();
            let step = tokio::select! {
                biased;
                Some(profile) = previews.recv() => LoopStep::Preview(profile),
                result = pass => LoopStep::Pass(result),
            };
            match step {
                LoopStep::Preview(profile) => {
                    debug!("Loop iteration {} interrupted by a preview", iteration);
                    self.inner.sessions.stop_for(guard);
                    self.loop_preview(guard, token, profile).await?;
                }
                LoopStep::Pass(Ok(report)) if report.end == PassEnd::Cancelled => return None,
                LoopStep::Pass(Ok(report)) => {
                    self.record_pass(guard).await;
                    if report.end == PassEnd::Exhausted {
                        warn!("Loop iteration {} produced no sound; continuing", iteration);
                    }
                }
                LoopStep::Pass(Err(_)) => {
                    error!("Loop iteration {} panicked; continuing", iteration);
                    self.inner.sessions.stop_for(guard);
                }
            }

            self.inner.boost.restore_for(guard);

            self.set_phase(guard, EnginePhase::RepeatPending).await;
            let next = started + cadence;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return None,
                    Some(profile) = previews.recv() => {
                        self.loop_preview(guard, token, profile).await?;
                    }
                    _ = tokio::time::sleep_until(next) => break,
                }
            }
        }
    }

    /// One pass of `profile` inside a ringing loop, at the live volume
    ///
    /// Not counted as a loop pass. `None` when the run was cancelled.
    async fn loop_preview(
        &self,
        guard: &RunGuard,
        token: &CancellationToken,
        profile: SoundProfile,
    ) -> Option<()> {
        let config = self.inner.settings.borrow().clone();
        let resource =
            resolve_or_default(&self.inner.catalog, profile, &config.custom_sound_reference);
        let strategy = select_strategy(config.volume_percent);
        info!("Loop preview of {} at {}%", profile, config.volume_percent);

        // The preview boosts for its own volume
        self.inner.boost.restore_for(guard);
        self.set_phase(guard, EnginePhase::Playing).await;
        let pass = AssertUnwindSafe(self.inner.runner.run_pass(&resource, &strategy, guard, token))
            .catch_unwind()
            .await;
        match pass {
            Ok(report) if report.end == PassEnd::Cancelled => return None,
            Ok(_) => {}
            Err(_) => {
                error!("Loop preview panicked; continuing");
                self.inner.sessions.stop_for(guard);
            }
        }
        self.inner.boost.restore_for(guard);
        self.set_phase(guard, EnginePhase::RepeatPending).await;
        Some(())
    }

    async fn set_phase(&self, guard: &RunGuard, phase: EnginePhase) {
        let mut core = self.inner.core.lock().await;
        if guard.is_current() {
            core.phase = phase;
        }
    }

    async fn record_pass(&self, guard: &RunGuard) {
        let mut core = self.inner.core.lock().await;
        if guard.is_current() {
            core.passes_completed += 1;
        }
    }

    /// Natural end of a run
    async fn finish_run(&self, guard: &RunGuard, reason: StopReason) {
        let mut core = self.inner.core.lock().await;
        if !guard.is_current() {
            debug!("Run {} already superseded", guard.generation());
            return;
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        core.run = None;
        self.release_device_state();
        let passes = core.passes_completed;
        reset(&mut core);

        info!("Alert finished ({:?}) after {} pass(es)", reason, passes);
        self.inner.state.broadcast_event(AlertEvent::AlertPlaybackStopped {
            reason,
            passes_completed: passes,
            timestamp: orderbell_common::time::now(),
        });
    }

    fn halt_locked(&self, core: &mut EngineCore, reason: StopReason) -> bool {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let was_active = core.run.is_some() || core.phase != EnginePhase::Idle;
        if let Some(token) = core.run.take() {
            token.cancel();
        }

        // Always release: cheap and idempotent when nothing is held
        self.release_device_state();

        if was_active {
            if let Err(e) = self.inner.device.cancel_vibration() {
                debug!("Vibration cancel treated as done: {}", e);
            }
            info!(
                "Alert stopped ({:?}) after {} pass(es)",
                reason, core.passes_completed
            );
            self.inner.state.broadcast_event(AlertEvent::AlertPlaybackStopped {
                reason,
                passes_completed: core.passes_completed,
                timestamp: orderbell_common::time::now(),
            });
        }
        reset(core);
        was_active
    }

    fn release_device_state(&self) {
        self.inner.sessions.stop_current();
        self.inner.effects.release_all();
        self.inner.boost.restore();
    }
}

fn reset(core: &mut EngineCore) {
    core.phase = EnginePhase::Idle;
    core.loop_state = LoopState::Inactive;
    core.mode = None;
    core.loop_previews = None;
}

/// What ended the pass phase of a loop iteration
enum LoopStep {
    Pass(std::thread::Result<PassReport>),
    Preview(SoundProfile),
}

/// Sleep unless cancelled first; `false` when cancelled
async fn pause(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[async_trait]
impl AlertTrigger for AlertPlaybackEngine {
    async fn alert(&self, order: &Order, batch_count: usize) {
        let profile = self.inner.settings.borrow().sound_profile;
        let outcome = self.trigger_alert(profile).await;
        debug!(
            "Alert for order {} (batch of {}): {:?}",
            order.number, batch_count, outcome
        );
    }

    async fn stop_alerts(&self, reason: StopReason) {
        self.halt(reason).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{SimulatedDevice, SimulatedDeviceConfig};

    fn timings() -> PlaybackTimings {
        PlaybackTimings {
            repeat_delay: Duration::from_millis(40),
            restore_grace: Duration::from_millis(20),
            loop_cadence: Duration::from_millis(150),
            pass_timeout: Duration::from_millis(500),
            ready_timeout: Duration::from_millis(100),
        }
    }

    fn engine_with(
        config: AlertConfiguration,
    ) -> (
        AlertPlaybackEngine,
        Arc<SimulatedDevice>,
        watch::Sender<AlertConfiguration>,
    ) {
        let device = Arc::new(SimulatedDevice::new(SimulatedDeviceConfig {
            clip_duration: Duration::from_millis(30),
            ready_delay: Duration::from_millis(5),
            initial_level: 6,
            max_level: 15,
            has_vibrator: true,
        }));
        let (tx, rx) = watch::channel(config);
        let engine = AlertPlaybackEngine::new(
            device.clone(),
            rx,
            SoundCatalog::default(),
            timings(),
            Arc::new(SharedState::new()),
        );
        (engine, device, tx)
    }

    async fn wait_idle(engine: &AlertPlaybackEngine) -> EngineStatus {
        for _ in 0..200 {
            let status = engine.status().await;
            if status.is_idle() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("engine did not become idle");
    }

    #[tokio::test]
    async fn test_disabled_does_nothing() {
        let (engine, device, _tx) = engine_with(AlertConfiguration {
            enabled: false,
            ..Default::default()
        });

        assert_eq!(
            engine.trigger_alert(SoundProfile::BuiltinBell).await,
            TriggerOutcome::Disabled
        );
        assert_eq!(
            engine.trigger_test_alert(SoundProfile::BuiltinBell).await,
            TriggerOutcome::Disabled
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(device.plays().is_empty());
        assert!(device.vibrations().is_empty());
    }

    #[tokio::test]
    async fn test_low_volume_single_pass_without_boost() {
        let (engine, device, _tx) = engine_with(AlertConfiguration::default());

        assert_eq!(
            engine.trigger_alert(SoundProfile::BuiltinChime).await,
            TriggerOutcome::Started(AlertMode::Sequence)
        );
        let status = wait_idle(&engine).await;

        assert_eq!(device.pass_count(), 1);
        assert!(device.level_history().is_empty());
        assert!(!status.boost_active);
        assert_eq!(device.plays()[0].resource, SoundResource::Builtin("order_chime".into()));
    }

    #[tokio::test]
    async fn test_preview_never_repeats() {
        let (engine, device, _tx) = engine_with(AlertConfiguration {
            volume_percent: 800,
            keep_ringing_until_acknowledged: true,
            ..Default::default()
        });

        assert_eq!(
            engine.trigger_test_alert(SoundProfile::SystemAlarm).await,
            TriggerOutcome::Started(AlertMode::Preview)
        );
        wait_idle(&engine).await;

        assert_eq!(device.pass_count(), 1);
        assert_eq!(device.current_level(), 6);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (engine, device, _tx) = engine_with(AlertConfiguration {
            volume_percent: 1000,
            ..Default::default()
        });

        engine.trigger_alert(SoundProfile::BuiltinAlert).await;
        tokio::time::sleep(Duration::from_millis(15)).await;

        assert!(engine.stop().await);
        assert!(!engine.stop().await);
        assert!(!engine.acknowledge().await);

        let status = engine.status().await;
        assert!(status.is_idle());
        assert_eq!(device.current_level(), 6);
        assert_eq!(device.active_instances(), 0);
        assert_eq!(device.active_effects(), 0);
    }

    #[tokio::test]
    async fn test_new_trigger_supersedes_sequence() {
        let (engine, device, _tx) = engine_with(AlertConfiguration {
            volume_percent: 600,
            ..Default::default()
        });

        engine.trigger_alert(SoundProfile::BuiltinBell).await;
        tokio::time::sleep(Duration::from_millis(15)).await;
        engine.trigger_alert(SoundProfile::BuiltinCash).await;
        let status = wait_idle(&engine).await;

        // Second run's two passes only
        assert_eq!(status.passes_completed, 2);
        assert_eq!(device.current_level(), 6);
        let last = device.plays().last().cloned().unwrap();
        assert_eq!(last.resource, SoundResource::Builtin("order_cash".into()));
    }

    #[tokio::test]
    async fn test_trigger_while_looping_keeps_loop() {
        let (engine, _device, _tx) = engine_with(AlertConfiguration {
            keep_ringing_until_acknowledged: true,
            ..Default::default()
        });

        assert_eq!(
            engine.trigger_alert(SoundProfile::BuiltinBell).await,
            TriggerOutcome::Started(AlertMode::Looping)
        );
        assert_eq!(
            engine.trigger_alert(SoundProfile::BuiltinCash).await,
            TriggerOutcome::AlreadyLooping
        );
        assert_eq!(
            engine.status().await.loop_state,
            LoopState::Active {
                profile: SoundProfile::BuiltinBell
            }
        );

        assert!(engine.acknowledge().await);
        assert!(engine.status().await.is_idle());
    }

    #[tokio::test]
    async fn test_preview_while_looping_keeps_loop() {
        let (engine, device, _tx) = engine_with(AlertConfiguration {
            volume_percent: 300,
            keep_ringing_until_acknowledged: true,
            ..Default::default()
        });

        engine.trigger_alert(SoundProfile::BuiltinBell).await;
        let generation = engine.status().await.generation;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            engine.trigger_test_alert(SoundProfile::BuiltinCash).await,
            TriggerOutcome::Started(AlertMode::Preview)
        );
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = engine.status().await;
        assert_eq!(status.generation, generation);
        assert_eq!(
            status.loop_state,
            LoopState::Active {
                profile: SoundProfile::BuiltinBell
            }
        );
        assert!(device
            .plays()
            .iter()
            .any(|p| p.resource == SoundResource::Builtin("order_cash".into())));

        assert!(engine.acknowledge().await);
        assert_eq!(device.current_level(), 6);
    }

    #[tokio::test]
    async fn test_loop_ends_when_flag_turns_off() {
        let (engine, device, tx) = engine_with(AlertConfiguration {
            volume_percent: 300,
            keep_ringing_until_acknowledged: true,
            ..Default::default()
        });

        engine.trigger_alert(SoundProfile::SystemRingtone).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send_modify(|c| c.keep_ringing_until_acknowledged = false);

        let status = wait_idle(&engine).await;
        assert!(status.passes_completed >= 2);
        assert!(device.pass_count() >= 2);
        assert_eq!(device.current_level(), 6);
    }
}
