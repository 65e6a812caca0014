//! Arrival coordinator
//!
//! Deduplicates "new order" arrivals, batches them over a short window and
//! raises exactly one alert per batch: the playback engine gets the most
//! recently created order of the batch together with the batch size, then
//! the UI callback gets the same pair.
//!
//! `on_arrival` never blocks: it updates the shared state under one mutex and
//! at most schedules a timer task. Errors while resolving orders drop that
//! order from the batch and never reach the arrival source.

use super::processed_ids::ProcessedIdSet;
use super::{AlertCallback, ArrivalEvent};
use crate::config::CoordinatorConfig;
use crate::db::orders::{OrderRepository, STATUS_PROCESSING};
use crate::error::Result;
use crate::playback::AlertTrigger;
use orderbell_common::events::StopReason;
use orderbell_common::{Order, OrderId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What happened to one arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalDisposition {
    /// Already processed; ignored
    Duplicate,
    /// Inside the startup-quiet window; recorded, never alerted
    Suppressed,
    /// Joined the pending batch (`flush_scheduled` tells whether this arrival
    /// scheduled the flush)
    Batched { flush_scheduled: bool },
}

struct ArrivalState {
    processed: ProcessedIdSet,
    pending: Vec<OrderId>,
    flush_scheduled: bool,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    repository: Arc<dyn OrderRepository>,
    trigger: Arc<dyn AlertTrigger>,
    callback: RwLock<Option<Arc<dyn AlertCallback>>>,
    state: Mutex<ArrivalState>,
    started_at: Instant,
}

/// Arrival coordinator handle; clones share state
#[derive(Clone)]
pub struct ArrivalCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl ArrivalCoordinator {
    /// The startup-quiet window starts now
    pub fn new(
        config: CoordinatorConfig,
        repository: Arc<dyn OrderRepository>,
        trigger: Arc<dyn AlertTrigger>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                repository,
                trigger,
                callback: RwLock::new(None),
                state: Mutex::new(ArrivalState {
                    processed: ProcessedIdSet::new(config.processed_cap),
                    pending: Vec::new(),
                    flush_scheduled: false,
                }),
                started_at: Instant::now(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ArrivalState> {
        self.inner.lock_state()
    }

    /// Handle one arrival
    ///
    /// Must be called from within a tokio runtime (the flush is a spawned
    /// timer task).
    pub fn on_arrival(&self, order_id: OrderId) -> ArrivalDisposition {
        let mut state = self.state();

        if !state.processed.insert(order_id) {
            debug!("Order {} already processed; ignoring", order_id);
            return ArrivalDisposition::Duplicate;
        }

        if self.in_startup_quiet_window() {
            info!("Order {} arrived during startup-quiet window; not alerting", order_id);
            return ArrivalDisposition::Suppressed;
        }

        state.pending.push(order_id);
        if state.flush_scheduled {
            debug!(
                "Order {} joined pending batch ({} orders)",
                order_id,
                state.pending.len()
            );
            return ArrivalDisposition::Batched {
                flush_scheduled: false,
            };
        }

        state.flush_scheduled = true;
        drop(state);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.config.batch_delay).await;
            inner.flush().await;
        });

        debug!("Order {} started a new batch", order_id);
        ArrivalDisposition::Batched {
            flush_scheduled: true,
        }
    }

    fn in_startup_quiet_window(&self) -> bool {
        let quiet = self.inner.config.startup_quiet;
        !quiet.is_zero() && self.inner.started_at.elapsed() < quiet
    }

    pub fn register_callback(&self, callback: Arc<dyn AlertCallback>) {
        *self
            .inner
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
        info!("Alert callback registered");
    }

    pub fn unregister_callback(&self) {
        *self
            .inner
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        info!("Alert callback unregistered");
    }

    /// Operator acknowledged `order_id`
    ///
    /// Stops any ring-until-acknowledged loop and current playback, then
    /// marks the order read. Returns whether the order was marked.
    pub async fn mark_acknowledged(&self, order_id: OrderId) -> bool {
        self.inner.trigger.stop_alerts(StopReason::Acknowledged).await;

        match self.inner.repository.mark_read(order_id).await {
            Ok(marked) => {
                if !marked {
                    warn!("Acknowledged order {} not found in store", order_id);
                }
                marked
            }
            Err(e) => {
                warn!("Failed to mark order {} as read: {}", order_id, e);
                false
            }
        }
    }

    /// Mark `order_id` printed and return the refreshed order
    pub async fn mark_printed(&self, order_id: OrderId) -> Result<Option<Order>> {
        let marked = self
            .inner
            .repository
            .mark_printed(order_id)
            .await
            .inspect_err(|e| warn!("Failed to mark order {} as printed: {}", order_id, e))?;
        if !marked {
            return Ok(None);
        }
        self.inner.repository.get_order(order_id).await
    }

    /// Stop current playback and any loop
    pub async fn stop_all(&self) {
        self.inner.trigger.stop_alerts(StopReason::Stopped).await;
    }

    /// Record orders already in progress so a restart does not re-alert them
    ///
    /// Returns how many ids were added; store errors are logged.
    pub async fn preload_processed_ids(&self) -> usize {
        let ids = match self
            .inner
            .repository
            .order_ids_with_status(STATUS_PROCESSING)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to preload processed order ids: {}", e);
                return 0;
            }
        };

        let mut state = self.state();
        let added = ids
            .into_iter()
            .filter(|id| state.processed.insert(*id))
            .count();
        info!("Preloaded {} processing order id(s)", added);
        added
    }

    pub fn clear_processed_ids(&self) {
        self.state().processed.clear();
        info!("Processed order ids cleared");
    }

    pub fn processed_count(&self) -> usize {
        self.state().processed.len()
    }

    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    pub fn is_processed(&self, order_id: OrderId) -> bool {
        self.state().processed.contains(order_id)
    }

    /// Consume arrivals from the transport until cancelled or closed
    pub async fn run_event_loop(
        &self,
        mut rx: mpsc::Receiver<ArrivalEvent>,
        cancel: CancellationToken,
    ) {
        info!("Arrival event loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => {
                        debug!("Arrival of order {} at {}", event.order_id, event.arrived_at);
                        self.on_arrival(event.order_id);
                    }
                    None => break,
                },
            }
        }
        info!("Arrival event loop stopped");
    }

    /// Periodically trim the processed-id set to its cap
    pub fn start_maintenance(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let coordinator = self.clone();
        let period = self.inner.config.maintenance_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = coordinator.state().processed.trim_to_cap();
                        debug!(
                            "Processed-id maintenance: {} trimmed, {} kept",
                            removed,
                            coordinator.processed_count()
                        );
                    }
                }
            }
        })
    }
}

impl CoordinatorInner {
    fn lock_state(&self) -> MutexGuard<'_, ArrivalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn callback(&self) -> Option<Arc<dyn AlertCallback>> {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the pending batch; repeats while arrivals keep coming in
    async fn flush(&self) {
        loop {
            let batch = {
                let mut state = self.lock_state();
                if state.pending.is_empty() {
                    state.flush_scheduled = false;
                    return;
                }
                std::mem::take(&mut state.pending)
            };
            self.dispatch(batch).await;
        }
    }

    async fn dispatch(&self, batch: Vec<OrderId>) {
        let batch_count = batch.len();

        let Some(callback) = self.callback() else {
            info!(
                "{} new order(s) but no alert callback registered; not alerting",
                batch_count
            );
            return;
        };

        let mut orders = Vec::with_capacity(batch_count);
        for id in &batch {
            match self.repository.get_order(*id).await {
                Ok(Some(order)) => orders.push(order),
                Ok(None) => warn!("Order {} not found; dropped from batch", id),
                Err(e) => warn!("Failed to load order {}: {}; dropped from batch", id, e),
            }
        }

        // Ties go to the later arrival
        let Some(representative) = orders.into_iter().max_by_key(|o| o.created_at) else {
            warn!("No order of the batch could be resolved; not alerting");
            return;
        };

        info!(
            "Alerting for order {} ({} new order(s))",
            representative.number, batch_count
        );
        self.trigger.alert(&representative, batch_count).await;
        callback.on_alert(&representative, batch_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Default)]
    struct MemoryOrders {
        orders: std::sync::Mutex<HashMap<OrderId, Order>>,
    }

    impl MemoryOrders {
        fn with(ids: &[i64]) -> Arc<Self> {
            let repo = Self::default();
            let base = Utc::now();
            for (offset, id) in ids.iter().enumerate() {
                repo.orders.lock().unwrap().insert(
                    OrderId(*id),
                    Order {
                        id: OrderId(*id),
                        number: format!("#{}", id),
                        status: STATUS_PROCESSING.to_string(),
                        created_at: base + ChronoDuration::seconds(offset as i64),
                        is_read: false,
                        is_printed: false,
                    },
                );
            }
            Arc::new(repo)
        }
    }

    #[async_trait]
    impl OrderRepository for MemoryOrders {
        async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
            Ok(self.orders.lock().unwrap().get(&id).cloned())
        }

        async fn order_ids_with_status(&self, status: &str) -> Result<Vec<OrderId>> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .values()
                .filter(|o| o.status == status)
                .map(|o| o.id)
                .collect())
        }

        async fn mark_read(&self, id: OrderId) -> Result<bool> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .get_mut(&id)
                .map(|o| o.is_read = true)
                .is_some())
        }

        async fn mark_printed(&self, id: OrderId) -> Result<bool> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .get_mut(&id)
                .map(|o| o.is_printed = true)
                .is_some())
        }
    }

    #[derive(Default)]
    struct CountingTrigger {
        alerts: std::sync::Mutex<Vec<(OrderId, usize)>>,
        stops: std::sync::Mutex<Vec<StopReason>>,
    }

    #[async_trait]
    impl AlertTrigger for CountingTrigger {
        async fn alert(&self, order: &Order, batch_count: usize) {
            self.alerts.lock().unwrap().push((order.id, batch_count));
        }

        async fn stop_alerts(&self, reason: StopReason) {
            self.stops.lock().unwrap().push(reason);
        }
    }

    #[derive(Default)]
    struct CountingCallback {
        calls: std::sync::Mutex<Vec<(OrderId, usize)>>,
    }

    impl AlertCallback for CountingCallback {
        fn on_alert(&self, order: &Order, batch_count: usize) {
            self.calls.lock().unwrap().push((order.id, batch_count));
        }
    }

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            batch_delay: Duration::from_millis(40),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_disposition_sequence() {
        let trigger = Arc::new(CountingTrigger::default());
        let coordinator = ArrivalCoordinator::new(config(), MemoryOrders::with(&[1, 2]), trigger);

        assert_eq!(
            coordinator.on_arrival(OrderId(1)),
            ArrivalDisposition::Batched {
                flush_scheduled: true
            }
        );
        assert_eq!(
            coordinator.on_arrival(OrderId(2)),
            ArrivalDisposition::Batched {
                flush_scheduled: false
            }
        );
        assert_eq!(coordinator.on_arrival(OrderId(1)), ArrivalDisposition::Duplicate);
        assert_eq!(coordinator.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_representative_is_newest_order() {
        let trigger = Arc::new(CountingTrigger::default());
        let callback = Arc::new(CountingCallback::default());
        // 30 is created last even though it arrives first
        let coordinator =
            ArrivalCoordinator::new(config(), MemoryOrders::with(&[10, 20, 30]), trigger.clone());
        coordinator.register_callback(callback.clone());

        coordinator.on_arrival(OrderId(30));
        coordinator.on_arrival(OrderId(10));
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(*trigger.alerts.lock().unwrap(), vec![(OrderId(30), 2)]);
        assert_eq!(*callback.calls.lock().unwrap(), vec![(OrderId(30), 2)]);
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_orders_dropped_but_counted() {
        let trigger = Arc::new(CountingTrigger::default());
        let coordinator =
            ArrivalCoordinator::new(config(), MemoryOrders::with(&[5]), trigger.clone());
        coordinator.register_callback(Arc::new(CountingCallback::default()));

        coordinator.on_arrival(OrderId(5));
        coordinator.on_arrival(OrderId(404));
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(*trigger.alerts.lock().unwrap(), vec![(OrderId(5), 2)]);
    }

    #[tokio::test]
    async fn test_unregister_stops_alerts() {
        let trigger = Arc::new(CountingTrigger::default());
        let coordinator =
            ArrivalCoordinator::new(config(), MemoryOrders::with(&[1]), trigger.clone());
        coordinator.register_callback(Arc::new(CountingCallback::default()));
        coordinator.unregister_callback();

        coordinator.on_arrival(OrderId(1));
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(trigger.alerts.lock().unwrap().is_empty());
        assert!(coordinator.is_processed(OrderId(1)));
    }

    #[tokio::test]
    async fn test_acknowledge_stops_and_marks_read() {
        let trigger = Arc::new(CountingTrigger::default());
        let orders = MemoryOrders::with(&[8]);
        let coordinator = ArrivalCoordinator::new(config(), orders.clone(), trigger.clone());

        assert!(coordinator.mark_acknowledged(OrderId(8)).await);
        assert!(!coordinator.mark_acknowledged(OrderId(9)).await);
        assert_eq!(
            *trigger.stops.lock().unwrap(),
            vec![StopReason::Acknowledged, StopReason::Acknowledged]
        );
        assert!(orders.orders.lock().unwrap()[&OrderId(8)].is_read);

        coordinator.stop_all().await;
        assert_eq!(trigger.stops.lock().unwrap().last(), Some(&StopReason::Stopped));
    }

    #[tokio::test]
    async fn test_mark_printed_returns_refreshed_order() {
        let coordinator = ArrivalCoordinator::new(
            config(),
            MemoryOrders::with(&[12]),
            Arc::new(CountingTrigger::default()),
        );

        let order = coordinator.mark_printed(OrderId(12)).await.unwrap().unwrap();
        assert!(order.is_printed);
        assert!(coordinator.mark_printed(OrderId(13)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_preload_and_clear() {
        let coordinator = ArrivalCoordinator::new(
            config(),
            MemoryOrders::with(&[1, 2, 3]),
            Arc::new(CountingTrigger::default()),
        );

        assert_eq!(coordinator.preload_processed_ids().await, 3);
        assert_eq!(coordinator.on_arrival(OrderId(2)), ArrivalDisposition::Duplicate);

        coordinator.clear_processed_ids();
        assert_eq!(coordinator.processed_count(), 0);
        assert!(matches!(
            coordinator.on_arrival(OrderId(2)),
            ArrivalDisposition::Batched { .. }
        ));
    }
}
