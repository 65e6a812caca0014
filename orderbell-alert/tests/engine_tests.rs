//! Alert playback engine integration tests
//!
//! Repeat sequences, ring-until-acknowledged loops, the fallback chain and
//! device-state restoration on every exit path.

mod helpers;

use helpers::{wait_until, TestServiceBuilder};
use orderbell_alert::device::{FailureInjection, SoundResource};
use orderbell_alert::playback::{EnginePhase, TriggerOutcome};
use orderbell_common::events::{AlertEvent, AlertMode, StopReason};
use orderbell_common::SoundProfile;
use std::time::Duration;

#[tokio::test]
async fn test_high_volume_sequence_plays_two_passes_and_restores_level() {
    let service = TestServiceBuilder::new().volume(800).build().await;

    let outcome = service
        .engine
        .trigger_alert(SoundProfile::BuiltinBell)
        .await;
    assert_eq!(outcome, TriggerOutcome::Started(AlertMode::Sequence));

    // Boosted while the first pass rings
    assert!(wait_until(Duration::from_millis(500), || async {
        service.device.current_level() > 6
    })
    .await);

    assert!(service.wait_idle(Duration::from_secs(2)).await);
    assert_eq!(service.device.pass_count(), 2);
    assert_eq!(service.device.current_level(), 6);
    assert_eq!(service.device.active_instances(), 0);
    assert_eq!(service.device.active_effects(), 0);

    // Two layers per pass at full gain
    let plays = service.device.plays();
    assert!(plays.iter().all(|p| p.concurrent == 2 && p.gain == 1.0));
}

#[tokio::test]
async fn test_low_volume_plays_once_without_boost() {
    let service = TestServiceBuilder::new().volume(60).build().await;

    service.engine.trigger_alert(SoundProfile::BuiltinChime).await;
    assert!(service.wait_idle(Duration::from_secs(1)).await);

    assert_eq!(service.device.pass_count(), 1);
    assert!(service.device.level_history().is_empty());
    assert!(service.device.effects_attached().is_empty());
    let plays = service.device.plays();
    assert!((plays[0].gain - 0.6).abs() < 1e-6);
}

#[tokio::test]
async fn test_loop_repeats_until_acknowledged() {
    let service = TestServiceBuilder::new()
        .volume(500)
        .looping(true)
        .build()
        .await;

    let outcome = service.engine.trigger_alert(SoundProfile::SystemAlarm).await;
    assert_eq!(outcome, TriggerOutcome::Started(AlertMode::Looping));

    tokio::time::sleep(Duration::from_millis(400)).await;
    let status = service.engine.status().await;
    assert!(status.is_looping());
    assert!(status.passes_completed >= 2);
    assert!(service.device.pass_count() >= 2);

    // A new batch while ringing keeps the loop
    assert_eq!(
        service.engine.trigger_alert(SoundProfile::SystemAlarm).await,
        TriggerOutcome::AlreadyLooping
    );

    assert!(service.engine.acknowledge().await);
    assert!(service.engine.status().await.is_idle());
    assert_eq!(service.device.current_level(), 6);
    assert_eq!(service.device.active_instances(), 0);

    // Nothing else plays after the acknowledgement
    let passes = service.device.pass_count();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(service.device.pass_count(), passes);
}

#[tokio::test]
async fn test_settings_previews_keep_the_loop_ringing() {
    let service = TestServiceBuilder::new()
        .volume(500)
        .looping(true)
        .build()
        .await;

    service.engine.trigger_alert(SoundProfile::SystemAlarm).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    service.control.set_volume(700).await;
    assert!(service.engine.status().await.is_looping());

    service
        .control
        .set_sound_profile(SoundProfile::BuiltinCash)
        .await;
    assert!(service.engine.status().await.is_looping());

    assert_eq!(
        service.engine.trigger_test_alert(SoundProfile::BuiltinBell).await,
        TriggerOutcome::Started(AlertMode::Preview)
    );

    // The previews play inside the loop
    assert!(wait_until(Duration::from_millis(500), || async {
        service
            .device
            .plays()
            .iter()
            .any(|p| p.resource == SoundResource::Builtin("order_cash".into()))
    })
    .await);

    let passes = service.engine.status().await.passes_completed;
    tokio::time::sleep(Duration::from_millis(400)).await;
    let status = service.engine.status().await;
    assert!(status.is_looping());
    assert!(status.passes_completed > passes);

    assert!(service.engine.acknowledge().await);
    assert_eq!(service.device.current_level(), 6);
    assert_eq!(service.device.active_instances(), 0);
}

#[tokio::test]
async fn test_loop_survives_panicking_passes() {
    let service = TestServiceBuilder::new()
        .volume(600)
        .looping(true)
        .build()
        .await;
    service.device.set_failures(FailureInjection {
        panic_on_play: true,
        ..Default::default()
    });

    service.engine.trigger_alert(SoundProfile::BuiltinBell).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(service.engine.status().await.is_looping());
    assert!(service.device.vibrations().len() >= 2);

    assert!(service.engine.acknowledge().await);
    assert!(service.engine.status().await.is_idle());
    assert_eq!(service.device.current_level(), 6);
    assert!(!service.engine.status().await.boost_active);
}

#[tokio::test]
async fn test_loop_keeps_ringing_when_every_attempt_fails() {
    let service = TestServiceBuilder::new()
        .volume(600)
        .looping(true)
        .build()
        .await;
    service.device.set_failures(FailureInjection {
        fail_all_play: true,
        ..Default::default()
    });

    service.engine.trigger_alert(SoundProfile::BuiltinAlert).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let status = service.engine.status().await;
    assert!(status.is_looping());
    assert!(status.passes_completed >= 2);
    assert!(service.device.vibrations().len() >= 2);

    assert!(service.engine.acknowledge().await);
    assert!(service.engine.status().await.is_idle());
    assert_eq!(service.device.current_level(), 6);
}

#[tokio::test]
async fn test_loop_ends_when_looping_switched_off() {
    let service = TestServiceBuilder::new().looping(true).build().await;

    service.engine.trigger_alert(SoundProfile::BuiltinAlert).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    service.control.set_keep_ringing_until_acknowledged(false).await;
    assert!(service.engine.status().await.is_idle());
}

#[tokio::test]
async fn test_multi_layer_failure_falls_back_to_single_instance() {
    let service = TestServiceBuilder::new().volume(1000).build().await;
    service.device.set_failures(FailureInjection {
        fail_concurrent: true,
        ..Default::default()
    });

    service.engine.trigger_test_alert(SoundProfile::BuiltinCash).await;
    assert!(service.wait_idle(Duration::from_secs(1)).await);

    let plays = service.device.plays();
    assert_eq!(plays.len(), 1);
    assert_eq!(plays[0].concurrent, 1);
    assert_eq!(service.device.current_level(), 6);
}

#[tokio::test]
async fn test_non_system_failure_falls_back_to_minimal_sound() {
    let service = TestServiceBuilder::new().volume(300).build().await;
    service.device.set_failures(FailureInjection {
        fail_non_system: true,
        ..Default::default()
    });

    service.engine.trigger_test_alert(SoundProfile::BuiltinChime).await;
    assert!(service.wait_idle(Duration::from_secs(1)).await);

    let plays = service.device.plays();
    assert_eq!(plays.len(), 1);
    assert_eq!(plays[0].resource, SoundResource::minimal());
}

#[tokio::test]
async fn test_panic_during_playback_still_restores_level() {
    let service = TestServiceBuilder::new().volume(900).build().await;
    let mut events = service.state.subscribe_events();
    service.device.set_failures(FailureInjection {
        panic_on_play: true,
        ..Default::default()
    });

    service.engine.trigger_alert(SoundProfile::BuiltinBell).await;
    assert!(service.wait_idle(Duration::from_secs(1)).await);
    assert_eq!(service.device.current_level(), 6);
    assert!(!service.engine.status().await.boost_active);

    let mut stopped = None;
    while let Ok(event) = events.try_recv() {
        if let AlertEvent::AlertPlaybackStopped { reason, .. } = event {
            stopped = Some(reason);
        }
    }
    assert_eq!(stopped, Some(StopReason::Failed));
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let service = TestServiceBuilder::new().volume(750).build().await;

    assert!(!service.engine.stop().await);

    service.engine.trigger_alert(SoundProfile::BuiltinTwoTone).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(service.engine.stop().await);
    assert!(!service.engine.stop().await);

    let status = service.engine.status().await;
    assert_eq!(status.phase, EnginePhase::Idle);
    assert_eq!(service.device.current_level(), 6);
    assert_eq!(service.device.active_effects(), 0);
}

#[tokio::test]
async fn test_externally_changed_level_is_not_clobbered_when_idle() {
    let service = TestServiceBuilder::new().volume(50).build().await;

    service.engine.trigger_alert(SoundProfile::SystemNotification).await;
    assert!(service.wait_idle(Duration::from_secs(1)).await);

    service.device.set_level_externally(11);
    service.engine.stop().await;
    assert_eq!(service.device.current_level(), 11);
}
