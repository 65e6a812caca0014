//! Test helpers for orderbell-alert integration tests
//!
//! Provides a fully wired service (in-memory SQLite, simulated device,
//! shortened timings) plus recording callbacks and polling helpers.

#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use orderbell_alert::api::AppContext;
use orderbell_alert::arrival::{AlertCallback, ArrivalCoordinator, ArrivalEvent};
use orderbell_alert::config::{CoordinatorConfig, PlaybackTimings};
use orderbell_alert::control::{AlertControl, EventAlertCallback};
use orderbell_alert::db::{SqliteOrderRepository, SqliteSettingsStore};
use orderbell_alert::device::{SimulatedDevice, SimulatedDeviceConfig};
use orderbell_alert::playback::resources::SoundCatalog;
use orderbell_alert::playback::AlertPlaybackEngine;
use orderbell_alert::settings::{AlertSettings, SettingsStore};
use orderbell_alert::SharedState;
use orderbell_common::{AlertConfiguration, Order, OrderId};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Playback timings scaled down for tests
pub fn fast_timings() -> PlaybackTimings {
    PlaybackTimings {
        repeat_delay: Duration::from_millis(40),
        restore_grace: Duration::from_millis(20),
        loop_cadence: Duration::from_millis(150),
        pass_timeout: Duration::from_millis(500),
        ready_timeout: Duration::from_millis(100),
    }
}

pub fn fast_coordinator() -> CoordinatorConfig {
    CoordinatorConfig {
        batch_delay: Duration::from_millis(60),
        ..Default::default()
    }
}

pub fn fast_device() -> SimulatedDeviceConfig {
    SimulatedDeviceConfig {
        clip_duration: Duration::from_millis(30),
        ready_delay: Duration::from_millis(5),
        initial_level: 6,
        max_level: 15,
        has_vibrator: true,
    }
}

/// Records every `on_alert` call
#[derive(Default)]
pub struct RecordingCallback {
    calls: Mutex<Vec<(OrderId, usize)>>,
}

impl RecordingCallback {
    pub fn calls(&self) -> Vec<(OrderId, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

impl AlertCallback for RecordingCallback {
    fn on_alert(&self, order: &Order, batch_count: usize) {
        self.calls.lock().unwrap().push((order.id, batch_count));
    }
}

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    orderbell_common::db::init_schema(&pool)
        .await
        .expect("schema");
    pool
}

/// Fully wired alert service
pub struct TestService {
    pub pool: SqlitePool,
    pub device: Arc<SimulatedDevice>,
    pub state: Arc<SharedState>,
    pub settings: Arc<AlertSettings>,
    pub engine: AlertPlaybackEngine,
    pub orders: Arc<SqliteOrderRepository>,
    pub coordinator: ArrivalCoordinator,
    pub control: AlertControl,
}

pub struct TestServiceBuilder {
    config: AlertConfiguration,
    coordinator: CoordinatorConfig,
    timings: PlaybackTimings,
    device: SimulatedDeviceConfig,
}

impl TestServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: AlertConfiguration::default(),
            coordinator: fast_coordinator(),
            timings: fast_timings(),
            device: fast_device(),
        }
    }

    pub fn volume(mut self, volume_percent: u16) -> Self {
        self.config.volume_percent = volume_percent;
        self
    }

    pub fn looping(mut self, keep_ringing: bool) -> Self {
        self.config.keep_ringing_until_acknowledged = keep_ringing;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn startup_quiet(mut self, quiet: Duration) -> Self {
        self.coordinator.startup_quiet = quiet;
        self
    }

    pub fn clip_duration(mut self, clip: Duration) -> Self {
        self.device.clip_duration = clip;
        self
    }

    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.coordinator.batch_delay = delay;
        self
    }

    pub async fn build(self) -> TestService {
        let pool = memory_pool().await;
        let store = Arc::new(SqliteSettingsStore::new(pool.clone()));
        store.save(&self.config).await.expect("seed settings");

        let state = Arc::new(SharedState::new());
        let settings = Arc::new(AlertSettings::load(store).await);
        let device = Arc::new(SimulatedDevice::new(self.device));
        let engine = AlertPlaybackEngine::new(
            device.clone(),
            settings.subscribe(),
            SoundCatalog::default(),
            self.timings,
            state.clone(),
        );
        let orders = Arc::new(SqliteOrderRepository::new(pool.clone()));
        let coordinator =
            ArrivalCoordinator::new(self.coordinator, orders.clone(), Arc::new(engine.clone()));
        let control = AlertControl::new(
            settings.clone(),
            engine.clone(),
            coordinator.clone(),
            state.clone(),
        );

        TestService {
            pool,
            device,
            state,
            settings,
            engine,
            orders,
            coordinator,
            control,
        }
    }
}

impl TestService {
    /// Store an order created `offset_secs` after a fixed base time
    pub async fn add_order(&self, id: i64, offset_secs: i64) -> Order {
        let order = Order {
            id: OrderId(id),
            number: format!("#{}", id),
            status: "processing".to_string(),
            created_at: base_time() + ChronoDuration::seconds(offset_secs),
            is_read: false,
            is_printed: false,
        };
        self.orders.upsert_order(&order).await.expect("upsert order");
        order
    }

    pub fn with_recording_callback(&self) -> Arc<RecordingCallback> {
        let callback = Arc::new(RecordingCallback::default());
        self.coordinator.register_callback(callback.clone());
        callback
    }

    /// Router context with a running arrival loop
    pub fn app_context(&self, cancel: CancellationToken) -> AppContext {
        let (tx, rx) = mpsc::channel::<ArrivalEvent>(32);
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move { coordinator.run_event_loop(rx, cancel).await });
        self.coordinator
            .register_callback(Arc::new(EventAlertCallback::new(self.state.clone())));

        AppContext {
            state: self.state.clone(),
            control: self.control.clone(),
            coordinator: self.coordinator.clone(),
            engine: self.engine.clone(),
            orders: self.orders.clone(),
            arrivals: tx,
        }
    }

    pub async fn wait_idle(&self, within: Duration) -> bool {
        let engine = self.engine.clone();
        wait_until(within, move || {
            let engine = engine.clone();
            async move { engine.status().await.is_idle() }
        })
        .await
    }
}

fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

/// Poll `condition` every 10 ms until true or `within` elapses
pub async fn wait_until<F, Fut>(within: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
