//! Room Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use signaling::SignalingRelay;
use tracing::info;

use super::{error_response, ApiResult};
use crate::SharedState;

/// Response for room creation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
    /// URL the phone opens to join as the camera
    pub phone_url: String,
}

/// Room occupancy
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub room_id: String,
    pub host: bool,
    pub phone: bool,
}

/// Allocate a room id. The room itself exists once a peer joins it.
pub async fn create_room(State(state): State<SharedState>) -> (StatusCode, Json<CreateRoomResponse>) {
    let state = state.read().await;
    let room_id = SignalingRelay::create_room_id();
    let phone_url = format!(
        "{}/phone?room={}",
        state.config.server.public_base_url.trim_end_matches('/'),
        room_id
    );

    info!("Allocated room {}", room_id);
    metrics::counter!("api_rooms_allocated_total").increment(1);
    (StatusCode::CREATED, Json(CreateRoomResponse { room_id, phone_url }))
}

/// Get room occupancy
pub async fn get_room(State(state): State<SharedState>, Path(room_id): Path<String>) -> ApiResult<RoomResponse> {
    let state = state.read().await;
    match state.relay.occupancy(&room_id) {
        Some((host, phone)) => Ok(Json(RoomResponse { room_id, host, phone })),
        None => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Room {} not found", room_id),
        )),
    }
}
