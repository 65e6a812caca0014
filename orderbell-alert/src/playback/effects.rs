//! Effect attachment registry
//!
//! Tracks the loudness/dynamics handles attached to each device session so
//! they can be released when the session ends. Release is idempotent and
//! release errors are treated as already satisfied.

use super::strategy::{Enhancement, PlaybackStrategy};
use crate::device::{AudioDevice, EffectHandle, EffectKind, SessionId};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub struct EffectRegistry {
    device: Arc<dyn AudioDevice>,
    handles: Mutex<HashMap<SessionId, Vec<EffectHandle>>>,
}

impl EffectRegistry {
    pub fn new(device: Arc<dyn AudioDevice>) -> Self {
        Self {
            device,
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<SessionId, Vec<EffectHandle>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach the effects `strategy` calls for to `session`
    ///
    /// Attaching to a session that already has effects is a no-op. On a
    /// partial failure the effects attached so far are released.
    pub fn attach(&self, session: SessionId, strategy: &PlaybackStrategy) -> Result<()> {
        if self.handles().contains_key(&session) {
            return Ok(());
        }

        let gain_mb = strategy.loudness_gain_mb();
        let loudness = self.device.attach_effect(session, EffectKind::Loudness, gain_mb)?;
        let mut attached = vec![loudness];

        if strategy.enhancement == Enhancement::Full {
            match self.device.attach_effect(session, EffectKind::Dynamics, gain_mb) {
                Ok(dynamics) => attached.push(dynamics),
                Err(e) => {
                    self.release_handles(attached);
                    return Err(e);
                }
            }
        }

        debug!(
            "Attached {} effect(s) to session {} at {} mB",
            attached.len(),
            session,
            gain_mb
        );
        self.handles().insert(session, attached);
        Ok(())
    }

    /// Release the effects of one session
    pub fn release(&self, session: SessionId) {
        let removed = self.handles().remove(&session);
        if let Some(handles) = removed {
            self.release_handles(handles);
        }
    }

    /// Release every tracked effect
    pub fn release_all(&self) {
        let drained: Vec<EffectHandle> = self.handles().drain().flat_map(|(_, h)| h).collect();
        self.release_handles(drained);
    }

    pub fn active_sessions(&self) -> usize {
        self.handles().len()
    }

    fn release_handles(&self, handles: Vec<EffectHandle>) {
        for handle in handles {
            if let Err(e) = self.device.release_effect(handle) {
                debug!("Effect {} release treated as done: {}", handle.id, e);
            }
        }
    }
}
