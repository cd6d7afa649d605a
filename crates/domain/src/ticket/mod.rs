//! Ticket aggregate: one admission, issued once and checked in once.

mod aggregate;
mod events;
mod service;

pub use aggregate::{Ticket, TicketState};
pub use events::{TicketCheckedInData, TicketEvent, TicketIssuedData};
pub use service::{Issuance, TicketService};

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Ticket already issued")]
    AlreadyIssued,

    #[error("Ticket has not been issued")]
    NotIssued,

    #[error("Ticket already checked in at {at}")]
    AlreadyCheckedIn { at: DateTime<Utc> },
}
