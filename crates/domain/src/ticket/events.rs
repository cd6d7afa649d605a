use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::catalog::TicketTypeId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TicketEvent {
    TicketIssued(TicketIssuedData),
    TicketCheckedIn(TicketCheckedInData),
}

impl DomainEvent for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::TicketIssued(_) => "TicketIssued",
            TicketEvent::TicketCheckedIn(_) => "TicketCheckedIn",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketIssuedData {
    pub ticket_id: AggregateId,
    pub order_id: AggregateId,
    pub ticket_type_id: TicketTypeId,
    pub ticket_type_name: String,
    pub holder_name: String,
    pub holder_email: String,

    /// Signed QR payload.
    pub code: String,

    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketCheckedInData {
    pub at: DateTime<Utc>,

    /// Entrance that scanned the ticket, if the scanner reports one.
    pub gate: Option<String>,
}

impl TicketEvent {
    pub fn checked_in(at: DateTime<Utc>, gate: Option<String>) -> Self {
        TicketEvent::TicketCheckedIn(TicketCheckedInData { at, gate })
    }
}
