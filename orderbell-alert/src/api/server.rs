//! HTTP server setup and routing
//!
//! Sets up the Axum router for the control endpoints and SSE.

use crate::arrival::{ArrivalCoordinator, ArrivalEvent};
use crate::config::Config;
use crate::control::AlertControl;
use crate::db::SqliteOrderRepository;
use crate::error::{Error, Result};
use crate::playback::AlertPlaybackEngine;
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub control: AlertControl,
    pub coordinator: ArrivalCoordinator,
    pub engine: AlertPlaybackEngine,
    pub orders: Arc<SqliteOrderRepository>,
    /// Arrival ingress into the coordinator's event loop
    pub arrivals: mpsc::Sender<ArrivalEvent>,
}

/// Build the router with all routes
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Alert settings
        .route("/settings", get(super::handlers::get_settings))
        .route("/settings/volume", post(super::handlers::set_volume))
        .route("/settings/profile", post(super::handlers::set_sound_profile))
        .route("/settings/enabled", post(super::handlers::set_enabled))
        .route("/settings/custom_sound", post(super::handlers::set_custom_sound))
        .route("/settings/keep_ringing", post(super::handlers::set_keep_ringing))

        // Alert control
        .route("/alerts/preview", post(super::handlers::preview))
        .route("/alerts/stop", post(super::handlers::stop_alerts))
        .route("/alerts/status", get(super::handlers::alert_status))

        // Orders
        .route("/orders/arrivals", post(super::handlers::order_arrival))
        .route("/orders/:order_id/acknowledge", post(super::handlers::acknowledge_order))
        .route("/orders/:order_id/printed", post(super::handlers::mark_order_printed))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        // Attach application context
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run<F>(config: &Config, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", config.bind_addr, e)))?;
    info!("Starting HTTP server on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
