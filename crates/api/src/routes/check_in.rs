//! Door scanning.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use domain::CheckInView;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CheckInRequest {
    pub gate: Option<String>,
}

/// GET /check-in/{code}: shows who the code belongs to without admitting them.
#[tracing::instrument(skip(state, code))]
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<CheckInView>, ApiError> {
    Ok(Json(state.check_in.lookup(&code).await?))
}

/// POST /check-in/{code}: admits the holder. The body is optional.
#[tracing::instrument(skip(state, code, body))]
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    body: Bytes,
) -> Result<Json<CheckInView>, ApiError> {
    let request: CheckInRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CheckInRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid check-in body: {e}")))?
    };

    let view = state
        .check_in
        .check_in(&code, request.gate, state.clock.now())
        .await?;
    Ok(Json(view))
}
