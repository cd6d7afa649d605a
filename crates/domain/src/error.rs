//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::order::OrderError;
use crate::participant::ParticipantError;
use crate::ticket::TicketError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Ticket error: {0}")]
    Ticket(#[from] TicketError),

    #[error("Participant error: {0}")]
    Participant(#[from] ParticipantError),

    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if another writer appended to the stream first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }

    /// Returns true if the command's idempotency key was already used.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            DomainError::EventStore(EventStoreError::DuplicateIdempotencyKey(_))
        )
    }

    pub(crate) fn not_found(aggregate_type: &'static str, id: impl ToString) -> Self {
        DomainError::AggregateNotFound {
            aggregate_type,
            aggregate_id: id.to_string(),
        }
    }
}
