//! One playback pass and its fallback chain
//!
//! A pass stops any prior session, fires vibration, boosts the output level
//! when needed, then tries an ordered list of [`PlaybackAttempt`]s until one
//! plays to completion. Failures never propagate out of a pass.

use super::session::SessionSlot;
use super::strategy::PlaybackStrategy;
use super::volume_boost::VolumeBoostController;
use crate::config::PlaybackTimings;
use crate::device::{AudioDevice, PlaybackInstance, SoundResource};
use crate::error::Result;
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Ways of getting sound out, from loudest to most conservative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackAttempt {
    /// `layer_count` overlapping instances, each with its own effects
    MultiLayer,
    /// One instance with effects
    SingleEnhanced,
    /// One instance, no effects
    SingleStandard,
    /// Default notification sound, no effects
    SystemMinimal,
}

impl PlaybackAttempt {
    /// Ordered fallback chain for a strategy
    pub fn chain(strategy: &PlaybackStrategy) -> Vec<PlaybackAttempt> {
        let mut chain = Vec::with_capacity(4);
        if strategy.layer_count > 1 {
            chain.push(PlaybackAttempt::MultiLayer);
        }
        if strategy.effects_enabled() {
            chain.push(PlaybackAttempt::SingleEnhanced);
        }
        chain.push(PlaybackAttempt::SingleStandard);
        chain.push(PlaybackAttempt::SystemMinimal);
        chain
    }
}

/// How a pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassEnd {
    /// Every instance finished
    Completed,
    /// The pass timeout elapsed first
    TimedOut,
    /// The run was cancelled
    Cancelled,
    /// Every attempt failed; counts as complete
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    /// Attempt that produced sound, if any
    pub attempt: Option<PlaybackAttempt>,
    pub end: PassEnd,
}

/// Identifies the run a task belongs to
///
/// The engine bumps the shared generation whenever a run is stopped or
/// superseded; a guard whose generation is stale must not touch device state.
#[derive(Debug, Clone)]
pub struct RunGuard {
    generation: Arc<AtomicU64>,
    mine: u64,
}

impl RunGuard {
    pub fn new(generation: Arc<AtomicU64>, mine: u64) -> Self {
        Self { generation, mine }
    }

    pub fn generation(&self) -> u64 {
        self.mine
    }

    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.mine
    }
}

/// Executes passes against the device
pub struct PassRunner {
    device: Arc<dyn AudioDevice>,
    sessions: Arc<SessionSlot>,
    boost: Arc<VolumeBoostController>,
    timings: PlaybackTimings,
}

impl PassRunner {
    pub fn new(
        device: Arc<dyn AudioDevice>,
        sessions: Arc<SessionSlot>,
        boost: Arc<VolumeBoostController>,
        timings: PlaybackTimings,
    ) -> Self {
        Self {
            device,
            sessions,
            boost,
            timings,
        }
    }

    /// Run one pass of `resource` with `strategy`
    pub async fn run_pass(
        &self,
        resource: &SoundResource,
        strategy: &PlaybackStrategy,
        guard: &RunGuard,
        cancel: &CancellationToken,
    ) -> PassReport {
        if cancel.is_cancelled() || !guard.is_current() {
            return PassReport {
                attempt: None,
                end: PassEnd::Cancelled,
            };
        }

        self.sessions.stop_for(guard);
        self.vibrate(strategy);

        if let Err(e) = self.boost.boost(strategy, guard) {
            warn!("Output level boost failed, playing at current level: {}", e);
        }

        for attempt in PlaybackAttempt::chain(strategy) {
            if cancel.is_cancelled() || !guard.is_current() {
                return PassReport {
                    attempt: None,
                    end: PassEnd::Cancelled,
                };
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Ok(PassEnd::Cancelled),
                result = self.try_attempt(attempt, resource, strategy, guard) => result,
            };

            match outcome {
                Ok(PassEnd::Cancelled) => {
                    // After an engine stop this is a no-op: it already cleaned up
                    self.sessions.stop_for(guard);
                    return PassReport {
                        attempt: Some(attempt),
                        end: PassEnd::Cancelled,
                    };
                }
                Ok(end) => {
                    debug!("Pass finished via {:?}: {:?}", attempt, end);
                    return PassReport {
                        attempt: Some(attempt),
                        end,
                    };
                }
                Err(e) => warn!("{:?} playback failed, falling back: {}", attempt, e),
            }
        }

        error!("All playback attempts failed for {}", resource);
        PassReport {
            attempt: None,
            end: PassEnd::Exhausted,
        }
    }

    fn vibrate(&self, strategy: &PlaybackStrategy) {
        let Some(pattern) = strategy.vibration else {
            return;
        };
        if !self.device.has_vibrator() {
            debug!("No vibrator available");
            return;
        }
        if let Err(e) = self.device.vibrate(&pattern) {
            warn!("Vibration failed: {}", e);
        }
    }

    async fn try_attempt(
        &self,
        attempt: PlaybackAttempt,
        resource: &SoundResource,
        strategy: &PlaybackStrategy,
        guard: &RunGuard,
    ) -> Result<PassEnd> {
        let Some(session_id) = self.sessions.begin(guard) else {
            return Ok(PassEnd::Cancelled);
        };

        let started = match attempt {
            PlaybackAttempt::MultiLayer => {
                self.device
                    .play_concurrent(resource, strategy.layer_count, 1.0)
            }
            PlaybackAttempt::SingleEnhanced | PlaybackAttempt::SingleStandard => self
                .device
                .play(resource, strategy.instance_gain())
                .map(|instance| vec![instance]),
            PlaybackAttempt::SystemMinimal => self
                .device
                .play(&SoundResource::minimal(), strategy.instance_gain())
                .map(|instance| vec![instance]),
        };
        let instances = match started {
            Ok(instances) => instances,
            Err(e) => {
                self.sessions.finish(session_id);
                return Err(e);
            }
        };

        let mut ended = Vec::with_capacity(instances.len());
        let mut pending_ready = Vec::with_capacity(instances.len());
        let mut started = instances.into_iter();
        while let Some(PlaybackInstance { id, ready, ended: done }) = started.next() {
            if !self.sessions.add_layer(session_id, id) {
                for rest in started {
                    if let Err(e) = self.device.stop(rest.id) {
                        debug!("Stop of {} treated as done: {}", rest.id, e);
                    }
                }
                return Ok(superseded_end(guard));
            }
            ended.push(done);
            pending_ready.push((id, ready));
        }

        let with_effects = matches!(
            attempt,
            PlaybackAttempt::MultiLayer | PlaybackAttempt::SingleEnhanced
        );
        if with_effects {
            for (instance, ready) in pending_ready {
                match tokio::time::timeout(self.timings.ready_timeout, ready).await {
                    Ok(Ok(device_session)) => {
                        match self
                            .sessions
                            .attach_effects(session_id, instance, device_session, strategy)
                        {
                            Ok(true) => {}
                            Ok(false) => return Ok(superseded_end(guard)),
                            Err(e) => {
                                self.sessions.finish(session_id);
                                return Err(e);
                            }
                        }
                    }
                    Ok(Err(_)) => debug!("{} ended before it was ready", instance),
                    Err(_) => warn!("{} not ready in time; playing without effects", instance),
                }
            }
        }

        self.sessions.mark_playing(session_id);

        let end = match tokio::time::timeout(self.timings.pass_timeout, join_all(ended)).await {
            Ok(_) => PassEnd::Completed,
            Err(_) => {
                warn!("Pass exceeded {:?}; stopping", self.timings.pass_timeout);
                PassEnd::TimedOut
            }
        };

        self.sessions.finish(session_id);
        Ok(end)
    }
}

/// End of an attempt whose session was stopped from outside
///
/// A stop that kept the run alive ends the pass normally. Otherwise the run
/// itself was stopped.
fn superseded_end(guard: &RunGuard) -> PassEnd {
    if guard.is_current() {
        PassEnd::Completed
    } else {
        PassEnd::Cancelled
    }
}
