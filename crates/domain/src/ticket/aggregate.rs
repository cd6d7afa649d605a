use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::catalog::TicketTypeId;

use super::{TicketError, TicketEvent, TicketIssuedData};

/// ```text
/// Valid ──► CheckedIn
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TicketState {
    #[default]
    Valid,
    CheckedIn,
}

impl TicketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketState::Valid => "Valid",
            TicketState::CheckedIn => "CheckedIn",
        }
    }
}

impl std::fmt::Display for TicketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ticket {
    id: Option<AggregateId>,
    version: Version,
    state: TicketState,
    order_id: Option<AggregateId>,
    ticket_type_id: Option<TicketTypeId>,
    ticket_type_name: String,
    holder_name: String,
    holder_email: String,
    code: String,
    issued_at: DateTime<Utc>,
    checked_in_at: Option<DateTime<Utc>>,
    gate: Option<String>,
}

impl Aggregate for Ticket {
    type Event = TicketEvent;
    type Error = TicketError;

    fn aggregate_type() -> &'static str {
        "Ticket"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            TicketEvent::TicketIssued(data) => {
                self.id = Some(data.ticket_id);
                self.order_id = Some(data.order_id);
                self.ticket_type_id = Some(data.ticket_type_id);
                self.ticket_type_name = data.ticket_type_name;
                self.holder_name = data.holder_name;
                self.holder_email = data.holder_email;
                self.code = data.code;
                self.issued_at = data.issued_at;
            }
            TicketEvent::TicketCheckedIn(data) => {
                self.state = TicketState::CheckedIn;
                self.checked_in_at = Some(data.at);
                self.gate = data.gate;
            }
        }
    }
}

impl Ticket {
    pub fn state(&self) -> TicketState {
        self.state
    }

    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn ticket_type_id(&self) -> Option<&TicketTypeId> {
        self.ticket_type_id.as_ref()
    }

    pub fn ticket_type_name(&self) -> &str {
        &self.ticket_type_name
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    pub fn holder_email(&self) -> &str {
        &self.holder_email
    }

    /// Signed QR payload.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn checked_in_at(&self) -> Option<DateTime<Utc>> {
        self.checked_in_at
    }

    pub fn gate(&self) -> Option<&str> {
        self.gate.as_deref()
    }
}

impl Ticket {
    pub fn issue(&self, data: TicketIssuedData) -> Result<Vec<TicketEvent>, TicketError> {
        if self.id.is_some() {
            return Err(TicketError::AlreadyIssued);
        }
        Ok(vec![TicketEvent::TicketIssued(data)])
    }

    /// One-way: a second scan is rejected with the time of the first.
    pub fn check_in(
        &self,
        at: DateTime<Utc>,
        gate: Option<String>,
    ) -> Result<Vec<TicketEvent>, TicketError> {
        if self.id.is_none() {
            return Err(TicketError::NotIssued);
        }
        if let Some(at) = self.checked_in_at {
            return Err(TicketError::AlreadyCheckedIn { at });
        }
        Ok(vec![TicketEvent::checked_in(at, gate)])
    }
}
