//! At-most-once ticket issuance for a paid order.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{
    AccessCode, AccessCodeSigner, Aggregate, CodeKind, DomainError, Issuance, IssueTickets, Order,
    OrderError, OrderService, OrderState, TicketIssuedData, TicketService,
};
use event_store::EventStore;

use crate::error::Result;

/// Creates the ticket streams for a paid order and marks it fulfilled.
///
/// Ticket ids are derived from the order id, so running this twice for the
/// same order (a redelivered webhook, a crash between steps) finds the
/// existing streams and writes nothing new.
pub struct TicketIssuer<S: EventStore> {
    orders: OrderService<S>,
    tickets: TicketService<S>,
    signer: AccessCodeSigner,
}

impl<S: EventStore + Clone> TicketIssuer<S> {
    pub fn new(store: S, signer: AccessCodeSigner) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            tickets: TicketService::new(store),
            signer,
        }
    }
}

impl<S: EventStore> TicketIssuer<S> {
    /// Issues every planned ticket of `order` and records `TicketsIssued`.
    /// Returns the ticket ids in plan order.
    #[tracing::instrument(skip(self, order), fields(order_id = ?order.id()))]
    pub async fn issue(&self, order: &Order, at: DateTime<Utc>) -> Result<Vec<AggregateId>> {
        let Some(order_id) = order.id() else {
            return Err(DomainError::Order(OrderError::NotPlaced).into());
        };
        if order.state() == OrderState::Fulfilled {
            return Ok(order.ticket_ids().to_vec());
        }

        let (holder_name, holder_email) = order
            .buyer()
            .map(|b| (b.name.clone(), b.email.clone()))
            .unwrap_or_default();

        let planned = order.planned_tickets();
        let mut ticket_ids = Vec::with_capacity(planned.len());
        let mut created = 0;
        for ticket in planned {
            let code = self
                .signer
                .sign(AccessCode::new(CodeKind::Ticket, ticket.ticket_id));
            let outcome = self
                .tickets
                .issue_ticket(TicketIssuedData {
                    ticket_id: ticket.ticket_id,
                    order_id,
                    ticket_type_id: ticket.ticket_type_id,
                    ticket_type_name: ticket.ticket_type_name,
                    holder_name: holder_name.clone(),
                    holder_email: holder_email.clone(),
                    code,
                    issued_at: at,
                })
                .await?;
            if matches!(outcome, Issuance::Issued(_)) {
                created += 1;
            }
            ticket_ids.push(ticket.ticket_id);
        }

        let recorded = self
            .orders
            .issue_tickets(IssueTickets {
                order_id,
                ticket_ids: ticket_ids.clone(),
                issued_at: at,
            })
            .await;

        match recorded {
            Ok(_) => {
                tracing::info!(%order_id, tickets = ticket_ids.len(), created, "order fulfilled");
                Ok(ticket_ids)
            }
            // Another run finished the order first.
            Err(e)
                if e.is_conflict()
                    || matches!(
                        e,
                        DomainError::Order(OrderError::InvalidStateTransition { .. })
                    ) =>
            {
                let current = self.orders.require_order(order_id).await?;
                if current.state() == OrderState::Fulfilled {
                    Ok(current.ticket_ids().to_vec())
                } else {
                    Err(e.into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::{
        Buyer, CommandContext, ConfirmPayment, Currency, Money, OrderLine, PlaceOrder,
    };
    use event_store::InMemoryEventStore;

    async fn paid_order(store: &InMemoryEventStore) -> Order {
        let orders = OrderService::new(store.clone());
        let order_id = AggregateId::new();
        let now = Utc::now();
        orders
            .place_order(PlaceOrder {
                order_id,
                buyer: Buyer::new("Ada Lovelace", "ada@example.com"),
                lines: vec![
                    OrderLine::new("general", "General Admission", 2, Money::from_cents(100)),
                    OrderLine::new("workshop", "Workshop Day", 1, Money::from_cents(50)),
                ],
                currency: Currency::default(),
                placed_at: now,
                expires_at: now + Duration::minutes(15),
            })
            .await
            .unwrap();
        orders
            .confirm_payment(
                ConfirmPayment {
                    order_id,
                    reference: "cs_0001".to_string(),
                    amount: Money::from_cents(250),
                    currency: Currency::default(),
                    paid_at: now,
                },
                CommandContext::new(),
            )
            .await
            .unwrap()
            .aggregate
    }

    fn issuer(store: &InMemoryEventStore) -> TicketIssuer<InMemoryEventStore> {
        TicketIssuer::new(
            store.clone(),
            AccessCodeSigner::new("issuance-test-secret").unwrap(),
        )
    }

    #[tokio::test]
    async fn issues_one_ticket_per_seat() {
        let store = InMemoryEventStore::new();
        let order = paid_order(&store).await;

        let ids = issuer(&store).issue(&order, Utc::now()).await.unwrap();
        assert_eq!(ids.len(), 3);

        let tickets = TicketService::new(store.clone()).get_tickets(&ids).await.unwrap();
        assert_eq!(tickets.len(), 3);
        assert_eq!(tickets[0].holder_name(), "Ada Lovelace");
        assert!(tickets[0].code().starts_with("TKT."));

        let order = OrderService::new(store).require_order(order.id().unwrap()).await.unwrap();
        assert_eq!(order.state(), OrderState::Fulfilled);
        assert_eq!(order.ticket_ids(), ids.as_slice());
    }

    #[tokio::test]
    async fn resuming_after_partial_issuance_writes_only_the_rest() {
        let store = InMemoryEventStore::new();
        let order = paid_order(&store).await;
        let first = order.planned_tickets().remove(0);
        TicketService::new(store.clone())
            .issue_ticket(TicketIssuedData {
                ticket_id: first.ticket_id,
                order_id: order.id().unwrap(),
                ticket_type_id: first.ticket_type_id,
                ticket_type_name: first.ticket_type_name,
                holder_name: "Ada Lovelace".to_string(),
                holder_email: "ada@example.com".to_string(),
                code: "TKT.x.y".to_string(),
                issued_at: Utc::now(),
            })
            .await
            .unwrap();
        let before = store.event_count().await;

        let ids = issuer(&store).issue(&order, Utc::now()).await.unwrap();
        assert_eq!(ids.len(), 3);
        // Two new tickets plus TicketsIssued.
        assert_eq!(store.event_count().await, before + 3);
    }

    #[tokio::test]
    async fn second_run_on_stale_order_returns_recorded_ids() {
        let store = InMemoryEventStore::new();
        let order = paid_order(&store).await;
        let issuer = issuer(&store);

        let first = issuer.issue(&order, Utc::now()).await.unwrap();
        let count = store.event_count().await;
        let second = issuer.issue(&order, Utc::now()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.event_count().await, count);
    }
}
