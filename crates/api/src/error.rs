//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{
    CatalogError, CheckInError, CodeError, DomainError, OrderError, ParticipantError, TicketError,
};
use event_store::EventStoreError;
use fulfillment::{FulfillmentError, GatewayError, WebhookError};
use projections::ProjectionError;
use thiserror::Error;

use crate::config::ConfigError;

/// Failures while wiring the application at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Access code signer error: {0}")]
    AccessCode(#[from] CodeError),

    #[error("Webhook verifier error: {0}")]
    Webhook(#[from] WebhookError),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),

    /// Webhook authentication failed.
    Unauthorized(String),

    /// An upstream service (the payment gateway) failed.
    BadGateway(String),

    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                msg
            }
            ApiError::BadGateway(msg) => {
                tracing::warn!(error = %msg, "upstream failure");
                msg
            }
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Unauthorized(msg) => msg,
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match &err {
            DomainError::Order(order_err) => match order_err {
                OrderError::NoLines
                | OrderError::InvalidQuantity { .. }
                | OrderError::InvalidPrice { .. }
                | OrderError::InvalidBuyer(_)
                | OrderError::InvalidDeadline => ApiError::BadRequest(message),
                OrderError::NotPlaced => ApiError::NotFound(message),
                _ => ApiError::Conflict(message),
            },
            DomainError::Ticket(ticket_err) => match ticket_err {
                TicketError::NotIssued => ApiError::NotFound(message),
                TicketError::AlreadyIssued | TicketError::AlreadyCheckedIn { .. } => {
                    ApiError::Conflict(message)
                }
            },
            DomainError::Participant(participant_err) => match participant_err {
                ParticipantError::NameRequired | ParticipantError::InvalidEmail(_) => {
                    ApiError::BadRequest(message)
                }
                ParticipantError::NotRegistered => ApiError::NotFound(message),
                ParticipantError::AlreadyRegistered | ParticipantError::AlreadyCheckedIn { .. } => {
                    ApiError::Conflict(message)
                }
            },
            DomainError::AggregateNotFound { .. } => ApiError::NotFound(message),
            DomainError::EventStore(
                EventStoreError::ConcurrencyConflict { .. }
                | EventStoreError::DuplicateIdempotencyKey(_),
            ) => ApiError::Conflict(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::UnknownTicketType(_)
            | FulfillmentError::NotOnSale(_)
            | FulfillmentError::QuantityLimit { .. } => ApiError::BadRequest(err.to_string()),
            FulfillmentError::SoldOut { .. } => ApiError::Conflict(err.to_string()),
            FulfillmentError::GatewayUnavailable(_) => ApiError::BadGateway(err.to_string()),
            FulfillmentError::Domain(e) => e.into(),
            FulfillmentError::Projection(e) => e.into(),
        }
    }
}

impl From<CheckInError> for ApiError {
    fn from(err: CheckInError) -> Self {
        match err {
            CheckInError::InvalidCode(_) => ApiError::BadRequest(err.to_string()),
            CheckInError::NotFound => ApiError::NotFound(err.to_string()),
            CheckInError::AlreadyCheckedIn { .. } => ApiError::Conflict(err.to_string()),
            CheckInError::Domain(e) => e.into(),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::InvalidPayload(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Unauthorized(err.to_string()),
        }
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
