//! HTTP request handlers
//!
//! Thin wrappers over [`AlertControl`](crate::control::AlertControl), the
//! arrival coordinator and the engine.

use crate::api::server::AppContext;
use crate::arrival::ArrivalEvent;
use crate::db::orders::STATUS_PROCESSING;
use crate::error::Error;
use crate::playback::{EngineStatus, TriggerOutcome};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use orderbell_common::{AlertConfiguration, Order, OrderId, SoundProfile};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Error body for every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(StatusResponse {
            status: message.into(),
        }),
    )
}

impl From<Error> for (StatusCode, Json<StatusResponse>) {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Common(orderbell_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, format!("error: {}", e))
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    uptime_seconds: i64,
    alerts_delivered: u64,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    /// Percent of the nominal level; clamped to 0-1000
    volume_percent: i64,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    profile: String,
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct CustomSoundRequest {
    reference: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    profile: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub outcome: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub stopped: bool,
}

#[derive(Debug, Deserialize)]
pub struct ArrivalRequest {
    order_id: i64,
    /// When present the order record is stored before the arrival is queued
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArrivalResponse {
    pub order_id: OrderId,
    pub queued: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcknowledgeResponse {
    pub order_id: OrderId,
    pub marked_read: bool,
}

fn parse_profile(name: &str) -> Result<SoundProfile, ApiError> {
    name.parse::<SoundProfile>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("error: {}", e)))
}

fn outcome_str(outcome: TriggerOutcome) -> String {
    match outcome {
        TriggerOutcome::Started(_) => "started".to_string(),
        TriggerOutcome::AlreadyLooping => "already_looping".to_string(),
        TriggerOutcome::Disabled => "disabled".to_string(),
    }
}

// ============================================================================
// Health
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "orderbell-alert".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: ctx.state.uptime_seconds(),
        alerts_delivered: ctx.state.alerts_delivered(),
    })
}

// ============================================================================
// Settings Endpoints
// ============================================================================

/// GET /settings - Current alert configuration
pub async fn get_settings(State(ctx): State<AppContext>) -> Json<AlertConfiguration> {
    Json(ctx.control.settings())
}

/// POST /settings/volume - Set volume and preview
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> Json<AlertConfiguration> {
    let config = ctx.control.set_volume(req.volume_percent).await;
    info!("Alert volume set to {}%", config.volume_percent);
    Json(config)
}

/// POST /settings/profile - Switch sound profile and preview it
pub async fn set_sound_profile(
    State(ctx): State<AppContext>,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<AlertConfiguration>, ApiError> {
    let profile = parse_profile(&req.profile)?;
    let config = ctx.control.set_sound_profile(profile).await;
    info!("Alert sound profile set to {}", profile);
    Ok(Json(config))
}

/// POST /settings/enabled
pub async fn set_enabled(
    State(ctx): State<AppContext>,
    Json(req): Json<EnabledRequest>,
) -> Json<AlertConfiguration> {
    let config = ctx.control.set_enabled(req.enabled).await;
    info!("Alerts {}", if config.enabled { "enabled" } else { "disabled" });
    Json(config)
}

/// POST /settings/custom_sound
pub async fn set_custom_sound(
    State(ctx): State<AppContext>,
    Json(req): Json<CustomSoundRequest>,
) -> Json<AlertConfiguration> {
    Json(ctx.control.set_custom_sound_reference(req.reference).await)
}

/// POST /settings/keep_ringing - Ring until acknowledged on/off
pub async fn set_keep_ringing(
    State(ctx): State<AppContext>,
    Json(req): Json<EnabledRequest>,
) -> Json<AlertConfiguration> {
    Json(
        ctx.control
            .set_keep_ringing_until_acknowledged(req.enabled)
            .await,
    )
}

// ============================================================================
// Alert Control Endpoints
// ============================================================================

/// POST /alerts/preview - One pass of the given or configured profile
pub async fn preview(
    State(ctx): State<AppContext>,
    body: Option<Json<PreviewRequest>>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let profile = req.profile.as_deref().map(parse_profile).transpose()?;

    let outcome = ctx.control.preview_sound(profile).await;
    Ok(Json(PreviewResponse {
        outcome: outcome_str(outcome),
    }))
}

/// POST /alerts/stop - Stop all playback
pub async fn stop_alerts(State(ctx): State<AppContext>) -> Json<StopResponse> {
    let stopped = ctx.control.stop_all().await;
    Json(StopResponse { stopped })
}

/// GET /alerts/status
pub async fn alert_status(State(ctx): State<AppContext>) -> Json<EngineStatus> {
    Json(ctx.engine.status().await)
}

// ============================================================================
// Order Endpoints
// ============================================================================

/// POST /orders/arrivals - New-order notification from order sync
pub async fn order_arrival(
    State(ctx): State<AppContext>,
    Json(req): Json<ArrivalRequest>,
) -> Result<Json<ArrivalResponse>, ApiError> {
    let order_id = OrderId(req.order_id);

    if let Some(number) = req.number {
        let order = Order {
            id: order_id,
            number,
            status: req
                .status
                .unwrap_or_else(|| STATUS_PROCESSING.to_string()),
            created_at: req.created_at.unwrap_or_else(orderbell_common::time::now),
            is_read: false,
            is_printed: false,
        };
        ctx.orders.upsert_order(&order).await?;
    }

    ctx.arrivals
        .send(ArrivalEvent::now(order_id))
        .await
        .map_err(|_| {
            warn!("Arrival loop not running; dropping order {}", order_id);
            api_error(StatusCode::SERVICE_UNAVAILABLE, "error: arrival loop stopped")
        })?;

    Ok(Json(ArrivalResponse {
        order_id,
        queued: true,
    }))
}

/// POST /orders/:order_id/acknowledge - Stop alerts, mark the order read
pub async fn acknowledge_order(
    State(ctx): State<AppContext>,
    Path(order_id): Path<i64>,
) -> Json<AcknowledgeResponse> {
    let order_id = OrderId(order_id);
    let marked_read = ctx.control.acknowledge(order_id).await;
    Json(AcknowledgeResponse {
        order_id,
        marked_read,
    })
}

/// POST /orders/:order_id/printed
pub async fn mark_order_printed(
    State(ctx): State<AppContext>,
    Path(order_id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    let order_id = OrderId(order_id);
    match ctx.coordinator.mark_printed(order_id).await? {
        Some(order) => Ok(Json(order)),
        None => Err(Error::NotFound(format!("Order {} not found", order_id)).into()),
    }
}
