//! Checkout and order lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{Aggregate, Buyer, Order, Ticket};
use fulfillment::{Cart, CartItem};
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub buyer: BuyerRequest,
    pub items: Vec<CartItem>,
}

#[derive(Deserialize)]
pub struct BuyerRequest {
    pub name: String,
    pub email: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
    pub state: String,
    pub total_cents: i64,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
    pub checkout_url: Option<String>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub state: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub lines: Vec<OrderLineResponse>,
    pub total_cents: i64,
    pub currency: String,
    pub placed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub checkout_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub ticket_ids: Vec<String>,
    pub closed_reason: Option<String>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub ticket_type_id: String,
    pub ticket_type_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct TicketResponse {
    pub id: String,
    pub ticket_type_id: String,
    pub ticket_type_name: String,
    pub holder_name: String,
    pub state: &'static str,

    /// QR payload presented at the door.
    pub code: String,

    pub issued_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let buyer = order.buyer();
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            state: order.state().to_string(),
            buyer_name: buyer.map(|b| b.name.clone()).unwrap_or_default(),
            buyer_email: buyer.map(|b| b.email.clone()).unwrap_or_default(),
            lines: order
                .lines()
                .iter()
                .map(|line| OrderLineResponse {
                    ticket_type_id: line.ticket_type_id.to_string(),
                    ticket_type_name: line.ticket_type_name.clone(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                })
                .collect(),
            total_cents: order.total().cents(),
            currency: order.currency().to_string(),
            placed_at: order.placed_at(),
            expires_at: order.expires_at(),
            checkout_url: order.checkout_url().map(str::to_string),
            paid_at: order.paid_at(),
            ticket_ids: order.ticket_ids().iter().map(|id| id.to_string()).collect(),
            closed_reason: order.closed_reason().map(str::to_string),
        }
    }
}

impl From<&Ticket> for TicketResponse {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id().map(|id| id.to_string()).unwrap_or_default(),
            ticket_type_id: ticket
                .ticket_type_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            ticket_type_name: ticket.ticket_type_name().to_string(),
            holder_name: ticket.holder_name().to_string(),
            state: ticket.state().as_str(),
            code: ticket.code().to_string(),
            issued_at: ticket.issued_at(),
            checked_in_at: ticket.checked_in_at(),
        }
    }
}

// -- Handlers --

/// POST /orders: places an order and opens a checkout session.
#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let cart = Cart {
        buyer: Buyer::new(req.buyer.name, req.buyer.email),
        items: req.items,
    };
    let receipt = state.checkout.checkout(cart).await?;
    let order = &receipt.order;

    let response = OrderCreatedResponse {
        order_id: order.id().map(|id| id.to_string()).unwrap_or_default(),
        state: order.state().to_string(),
        total_cents: order.total().cents(),
        currency: order.currency().to_string(),
        expires_at: order.expires_at(),
        checkout_url: receipt.checkout_url,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/{id}/tickets: issued tickets with their QR payloads.
#[tracing::instrument(skip(state))]
pub async fn tickets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TicketResponse>>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    let tickets = state.tickets.get_tickets(order.ticket_ids()).await?;
    Ok(Json(tickets.iter().map(TicketResponse::from).collect()))
}
