//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::{Order, PlannedTicket};
pub use commands::*;
pub use events::{
    LatePaymentRefundedData, OrderCancelledData, OrderEvent, OrderExpiredData, OrderPlacedData,
    PaymentConfirmedData, PaymentInitiatedData, TicketsIssuedData,
};
pub use service::OrderService;
pub use state::OrderState;
pub use value_objects::{Buyer, Currency, Money, OrderLine, merge_lines};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::catalog::TicketTypeId;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order has not been placed")]
    NotPlaced,

    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderState,
        action: &'static str,
    },

    #[error("Order has no lines")]
    NoLines,

    #[error("Invalid quantity {quantity} for {ticket_type_id} (must be greater than 0)")]
    InvalidQuantity {
        ticket_type_id: TicketTypeId,
        quantity: u32,
    },

    #[error("Invalid price {price} for {ticket_type_id} (must not be negative)")]
    InvalidPrice {
        ticket_type_id: TicketTypeId,
        price: Money,
    },

    #[error("Invalid buyer: {0}")]
    InvalidBuyer(String),

    #[error("Payment deadline must be after the order is placed")]
    InvalidDeadline,

    #[error("Payment already initiated with reference {reference}")]
    PaymentAlreadyInitiated { reference: String },

    #[error("Payment deadline passed at {expires_at}")]
    DeadlinePassed { expires_at: DateTime<Utc> },

    #[error("Payment amount {actual} does not match order total {expected}")]
    AmountMismatch { expected: Money, actual: Money },

    #[error("Payment currency {actual} does not match order currency {expected}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    #[error("Payment reference {actual} does not match checkout reference {expected}")]
    ReferenceMismatch { expected: String, actual: String },

    #[error("Order expires at {expires_at}")]
    NotYetExpired { expires_at: DateTime<Utc> },

    #[error("Expected {expected} tickets, got {actual}")]
    TicketCountMismatch { expected: usize, actual: usize },

    #[error("Payment {reference} was already refunded")]
    AlreadyRefunded { reference: String },
}
