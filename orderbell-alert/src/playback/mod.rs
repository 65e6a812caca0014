//! Alert playback subsystem
//!
//! Strategy selection, sound resolution, output-level boosting, effect
//! bookkeeping, single passes with their fallback chain, and the engine that
//! sequences passes into repeat and ring-until-acknowledged alerts.

pub mod effects;
pub mod engine;
pub mod pass;
pub mod resources;
pub mod session;
pub mod strategy;
pub mod volume_boost;

pub use engine::{AlertPlaybackEngine, EnginePhase, EngineStatus, LoopState, TriggerOutcome};
pub use strategy::{select_strategy, Enhancement, PlaybackStrategy};

use async_trait::async_trait;
use orderbell_common::events::StopReason;
use orderbell_common::Order;

/// What the arrival side uses to start and stop alerts
#[async_trait]
pub trait AlertTrigger: Send + Sync {
    /// Alert for `order`, the representative of `batch_count` arrivals
    async fn alert(&self, order: &Order, batch_count: usize);

    /// Stop any alert in progress, including a ring-until-acknowledged loop
    async fn stop_alerts(&self, reason: StopReason);
}
