//! Active playback session
//!
//! Exactly one session is active engine-wide. `begin()` fully stops and
//! releases the previous session before any layer of the new one starts, and
//! `finish()` only touches the session it was given so a late finisher cannot
//! release its successor.

use super::effects::EffectRegistry;
use super::pass::RunGuard;
use super::strategy::PlaybackStrategy;
use crate::device::{AudioDevice, InstanceId, SessionId};
use crate::error::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Preparing,
    Playing,
    Stopping,
}

/// One started instance and, once known, its device session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerHandle {
    pub instance: InstanceId,
    pub device_session: Option<SessionId>,
}

#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub session_id: u64,
    pub layers: Vec<LayerHandle>,
    pub state: SessionState,
}

/// Holder of the engine-wide active session
pub struct SessionSlot {
    device: Arc<dyn AudioDevice>,
    effects: Arc<EffectRegistry>,
    current: Mutex<Option<PlaybackSession>>,
    next_id: AtomicU64,
}

impl SessionSlot {
    pub fn new(device: Arc<dyn AudioDevice>, effects: Arc<EffectRegistry>) -> Self {
        Self {
            device,
            effects,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<PlaybackSession>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop whatever is active and open a new session in `Preparing`
    ///
    /// Returns `None` if `guard`'s run was stopped; the check happens under
    /// the slot lock so a concurrent stop either sees the new session or
    /// prevents it.
    pub fn begin(&self, guard: &RunGuard) -> Option<u64> {
        let (session_id, previous) = {
            let mut current = self.current();
            if !guard.is_current() {
                return None;
            }
            let session_id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let previous = current.replace(PlaybackSession {
                session_id,
                layers: Vec::new(),
                state: SessionState::Preparing,
            });
            (session_id, previous)
        };

        if let Some(old) = previous {
            self.release(old);
        }
        Some(session_id)
    }

    /// Attach a started instance to `session_id`
    ///
    /// Returns `false` (and stops the instance) if that session is no longer
    /// the active one.
    pub fn add_layer(&self, session_id: u64, instance: InstanceId) -> bool {
        let accepted = {
            let mut current = self.current();
            match current.as_mut() {
                Some(session) if session.session_id == session_id => {
                    session.layers.push(LayerHandle {
                        instance,
                        device_session: None,
                    });
                    true
                }
                _ => false,
            }
        };

        if !accepted {
            debug!("Session {} no longer active; stopping {}", session_id, instance);
            if let Err(e) = self.device.stop(instance) {
                debug!("Stop of {} treated as done: {}", instance, e);
            }
        }
        accepted
    }

    /// Record the device session of `instance` and attach effects to it
    ///
    /// Both happen under the slot lock. Returns `Ok(false)` without
    /// attaching when `session_id` is no longer the active session, so a
    /// concurrent stop never misses effects attached behind its back.
    pub fn attach_effects(
        &self,
        session_id: u64,
        instance: InstanceId,
        device_session: SessionId,
        strategy: &PlaybackStrategy,
    ) -> Result<bool> {
        let mut current = self.current();
        let layer = current
            .as_mut()
            .filter(|s| s.session_id == session_id)
            .and_then(|s| s.layers.iter_mut().find(|l| l.instance == instance));
        let Some(layer) = layer else {
            debug!("Session {} no longer active; skipping effects", session_id);
            return Ok(false);
        };
        self.effects.attach(device_session, strategy)?;
        layer.device_session = Some(device_session);
        Ok(true)
    }

    pub fn mark_playing(&self, session_id: u64) {
        let mut current = self.current();
        if let Some(session) = current.as_mut().filter(|s| s.session_id == session_id) {
            session.state = SessionState::Playing;
        }
    }

    /// Stop and release `session_id` if it is still the active session
    pub fn finish(&self, session_id: u64) {
        let taken = {
            let mut current = self.current();
            if current.as_ref().map(|s| s.session_id) == Some(session_id) {
                current.take()
            } else {
                None
            }
        };
        if let Some(session) = taken {
            self.release(session);
        }
    }

    /// Stop the active session on behalf of `guard`'s run
    ///
    /// No-op once that run has been stopped, so a late task cannot stop its
    /// successor's session.
    pub fn stop_for(&self, guard: &RunGuard) {
        let taken = {
            let mut current = self.current();
            if !guard.is_current() {
                return;
            }
            current.take()
        };
        if let Some(session) = taken {
            self.release(session);
        }
    }

    /// Stop and release the active session, if any (idempotent)
    pub fn stop_current(&self) {
        let taken = self.current().take();
        if let Some(session) = taken {
            self.release(session);
        }
    }

    pub fn state(&self) -> SessionState {
        self.current()
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn snapshot(&self) -> Option<PlaybackSession> {
        self.current().clone()
    }

    fn release(&self, mut session: PlaybackSession) {
        session.state = SessionState::Stopping;
        for layer in &session.layers {
            if let Err(e) = self.device.stop(layer.instance) {
                debug!("Stop of {} treated as done: {}", layer.instance, e);
            }
            if let Some(device_session) = layer.device_session {
                self.effects.release(device_session);
            }
        }
        debug!(
            "Session {} released ({} layer(s))",
            session.session_id,
            session.layers.len()
        );
    }
}
