//! Sales and attendance counters.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use projections::SalesSnapshot;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub sales: SalesSnapshot,

    /// Orders placed but not yet fulfilled, expired or cancelled.
    pub pending_orders: usize,
}

/// GET /stats
#[tracing::instrument(skip(state))]
pub async fn get(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    state.availability.refresh().await?;

    Ok(Json(StatsResponse {
        sales: state.availability.sales().snapshot().await,
        pending_orders: state.availability.pending().count().await,
    }))
}
