//! Fulfillment error types.

use domain::{DomainError, TicketTypeId};
use projections::ProjectionError;
use thiserror::Error;

/// Failures talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway answered with a non-success status.
    #[error("Gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never got an answer.
    #[error("Gateway transport error: {0}")]
    Transport(String),

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::InvalidResponse(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

/// Errors raised by checkout, webhook fulfillment and the expiry worker.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Unknown ticket type: {0}")]
    UnknownTicketType(TicketTypeId),

    #[error("Ticket type {0} is not on sale")]
    NotOnSale(TicketTypeId),

    #[error("At most {limit} tickets allowed, requested {requested}")]
    QuantityLimit { requested: u32, limit: u32 },

    #[error("Sold out: {ticket_type_id} has {remaining} left, requested {requested}")]
    SoldOut {
        ticket_type_id: TicketTypeId,
        remaining: u32,
        requested: u32,
    },

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(#[source] GatewayError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl FulfillmentError {
    /// Returns true if another writer changed the order first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, FulfillmentError::Domain(e) if e.is_conflict())
    }
}

pub type Result<T> = std::result::Result<T, FulfillmentError>;
