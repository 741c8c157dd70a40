//! Alert Routes

use alerting::{AlertConfig, Severity};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use storage::{AlertRecord, Persistence};
use tracing::info;

use super::{error_response, ApiResult};
use crate::SharedState;

/// Query parameters for alerts endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Filter by severity
    pub severity: Option<Severity>,
    /// Maximum number of records
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for alerts endpoint
#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub data: Vec<AlertRecord>,
    pub count: usize,
    pub undelivered_count: usize,
}

/// Alert settings of a session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSettingsResponse {
    pub session_id: String,
    /// False when the server defaults are in effect
    pub persisted: bool,
    pub settings: AlertConfig,
}

/// Get alerts of a session, newest first
pub async fn get_alerts(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Query(params): Query<AlertQuery>,
) -> ApiResult<AlertResponse> {
    let state = state.read().await;
    let limit = params.limit.min(1000);

    let alerts = state
        .repository
        .get_alerts(&session_id, params.severity, limit)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let undelivered = alerts.iter().filter(|a| !a.delivered).count();

    Ok(Json(AlertResponse {
        count: alerts.len(),
        undelivered_count: undelivered,
        data: alerts,
    }))
}

/// Get the alert settings a session would start with
pub async fn get_alert_settings(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> ApiResult<AlertSettingsResponse> {
    let state = state.read().await;
    let saved = state
        .repository
        .load_alert_settings(&session_id)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(AlertSettingsResponse {
        session_id,
        persisted: saved.is_some(),
        settings: saved.unwrap_or_else(|| state.config.session.alerts.clone()),
    }))
}

/// Validate and persist alert settings for a session
pub async fn put_alert_settings(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Json(settings): Json<AlertConfig>,
) -> ApiResult<AlertSettingsResponse> {
    settings
        .validate()
        .map_err(|e| error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let state = state.read().await;
    state
        .repository
        .save_alert_settings(&session_id, &settings)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    info!("Alert settings saved for session {}", session_id);
    Ok(Json(AlertSettingsResponse {
        session_id,
        persisted: true,
        settings,
    }))
}
