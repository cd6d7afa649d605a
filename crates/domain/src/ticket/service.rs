use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Ticket, TicketError, TicketIssuedData};

/// Outcome of an issuance attempt.
#[derive(Debug)]
pub enum Issuance {
    Issued(Ticket),

    /// The ticket stream already existed; nothing was written.
    AlreadyIssued,
}

pub struct TicketService<S: EventStore> {
    handler: CommandHandler<S, Ticket>,
}

impl<S: EventStore> TicketService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Creates the ticket stream. Losing the race to another issuer, or
    /// finding the ticket already there, is reported as
    /// [`Issuance::AlreadyIssued`].
    #[tracing::instrument(skip(self, data), fields(ticket_id = %data.ticket_id, order_id = %data.order_id))]
    pub async fn issue_ticket(&self, data: TicketIssuedData) -> Result<Issuance, DomainError> {
        let ticket_id = data.ticket_id;
        match self
            .handler
            .execute(ticket_id, |ticket| ticket.issue(data))
            .await
        {
            Ok(result) => {
                metrics::counter!("tickets_issued_total").increment(1);
                Ok(Issuance::Issued(result.aggregate))
            }
            Err(DomainError::Ticket(TicketError::AlreadyIssued)) => Ok(Issuance::AlreadyIssued),
            Err(e) if e.is_conflict() => Ok(Issuance::AlreadyIssued),
            Err(e) => Err(e),
        }
    }

    /// Marks the ticket as used.
    ///
    /// A concurrent scan that wins the append is reported as
    /// `AlreadyCheckedIn` with the winner's timestamp.
    #[tracing::instrument(skip(self))]
    pub async fn check_in(
        &self,
        ticket_id: AggregateId,
        at: DateTime<Utc>,
        gate: Option<String>,
    ) -> Result<CommandResult<Ticket>, DomainError> {
        match self
            .handler
            .execute(ticket_id, |ticket| ticket.check_in(at, gate))
            .await
        {
            Err(e) if e.is_conflict() => {
                let ticket = self.handler.load(ticket_id).await?;
                match ticket.checked_in_at() {
                    Some(at) => Err(TicketError::AlreadyCheckedIn { at }.into()),
                    None => Err(e),
                }
            }
            other => other,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_ticket(&self, ticket_id: AggregateId) -> Result<Option<Ticket>, DomainError> {
        self.handler.load_existing(ticket_id).await
    }

    /// Loads tickets in the given order, skipping ids with no stream.
    pub async fn get_tickets(&self, ticket_ids: &[AggregateId]) -> Result<Vec<Ticket>, DomainError> {
        let mut tickets = Vec::with_capacity(ticket_ids.len());
        for id in ticket_ids {
            if let Some(ticket) = self.get_ticket(*id).await? {
                tickets.push(ticket);
            }
        }
        Ok(tickets)
    }
}
