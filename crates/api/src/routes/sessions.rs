//! Session Sample Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use storage::SampleRecord;

use super::{error_response, ApiResult};
use crate::SharedState;

/// Query parameters for samples endpoint
#[derive(Debug, Deserialize)]
pub struct SampleQuery {
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

/// Response for samples endpoint
#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub data: Vec<SampleRecord>,
    pub meta: SampleMeta,
}

#[derive(Debug, Serialize)]
pub struct SampleMeta {
    pub count: usize,
    pub limit: usize,
}

/// Get the most recent engagement samples of a session, newest first
pub async fn get_samples(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Query(params): Query<SampleQuery>,
) -> ApiResult<SampleResponse> {
    let state = state.read().await;
    let limit = params.limit.min(1000);

    let data = state
        .repository
        .get_samples(&session_id, limit)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(SampleResponse {
        meta: SampleMeta {
            count: data.len(),
            limit,
        },
        data,
    }))
}
