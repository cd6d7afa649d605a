//! Catalog listing with live availability.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct TicketTypeResponse {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub max_per_order: u32,
    pub on_sale: bool,
    pub capacity: Option<u32>,

    /// `None` for ticket types without a capacity limit.
    pub remaining: Option<u32>,
}

/// GET /ticket-types
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TicketTypeResponse>>, ApiError> {
    state.availability.refresh().await?;
    let now = state.clock.now();

    let mut response = Vec::new();
    for ticket_type in state.catalog.list() {
        let remaining = state.availability.remaining(&ticket_type, now).await;
        response.push(TicketTypeResponse {
            id: ticket_type.id.to_string(),
            name: ticket_type.name,
            price_cents: ticket_type.price.cents(),
            max_per_order: ticket_type.max_per_order,
            on_sale: ticket_type.on_sale,
            capacity: ticket_type.capacity,
            remaining,
        });
    }

    Ok(Json(response))
}
