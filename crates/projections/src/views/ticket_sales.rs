//! Sales and attendance counters per ticket type and participant kind.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Money, OrderEvent, ParticipantEvent, ParticipantKind, TicketEvent, TicketTypeId};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketTypeSales {
    pub issued: u32,
    pub checked_in: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParticipantAttendance {
    pub registered: u32,
    pub checked_in: u32,
}

/// Point-in-time copy of every counter, shaped for `/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SalesSnapshot {
    pub ticket_types: BTreeMap<TicketTypeId, TicketTypeSales>,
    pub participants: BTreeMap<&'static str, ParticipantAttendance>,
    pub orders_paid: u32,
    pub revenue: Money,
    pub refunds: u32,
    pub refunded: Money,
}

#[derive(Default)]
struct SalesState {
    snapshot: SalesSnapshot,
    ticket_types: HashMap<AggregateId, TicketTypeId>,
    participant_kinds: HashMap<AggregateId, ParticipantKind>,
    position: ProjectionPosition,
}

/// Read model counting issued and checked-in tickets, participant arrivals
/// and confirmed revenue.
#[derive(Clone, Default)]
pub struct TicketSalesView {
    state: Arc<RwLock<SalesState>>,
}

impl TicketSalesView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tickets of this type issued so far.
    pub async fn sold(&self, ticket_type_id: &TicketTypeId) -> u32 {
        self.state
            .read()
            .await
            .snapshot
            .ticket_types
            .get(ticket_type_id)
            .map_or(0, |sales| sales.issued)
    }

    pub async fn ticket_type(&self, ticket_type_id: &TicketTypeId) -> TicketTypeSales {
        self.state
            .read()
            .await
            .snapshot
            .ticket_types
            .get(ticket_type_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn participants(&self, kind: ParticipantKind) -> ParticipantAttendance {
        self.state
            .read()
            .await
            .snapshot
            .participants
            .get(kind.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub async fn snapshot(&self) -> SalesSnapshot {
        self.state.read().await.snapshot.clone()
    }

    fn apply_order(state: &mut SalesState, event: OrderEvent) {
        match event {
            OrderEvent::PaymentConfirmed(data) => {
                state.snapshot.orders_paid += 1;
                state.snapshot.revenue += data.amount;
            }
            OrderEvent::LatePaymentRefunded(data) => {
                state.snapshot.refunds += 1;
                state.snapshot.refunded += data.amount;
            }
            _ => {}
        }
    }

    fn apply_ticket(state: &mut SalesState, ticket_id: AggregateId, event: TicketEvent) {
        match event {
            TicketEvent::TicketIssued(data) => {
                state
                    .snapshot
                    .ticket_types
                    .entry(data.ticket_type_id.clone())
                    .or_default()
                    .issued += 1;
                state.ticket_types.insert(ticket_id, data.ticket_type_id);
            }
            TicketEvent::TicketCheckedIn(_) => {
                if let Some(ticket_type_id) = state.ticket_types.get(&ticket_id).cloned() {
                    state
                        .snapshot
                        .ticket_types
                        .entry(ticket_type_id)
                        .or_default()
                        .checked_in += 1;
                }
            }
        }
    }

    fn apply_participant(state: &mut SalesState, participant_id: AggregateId, event: ParticipantEvent) {
        match event {
            ParticipantEvent::ParticipantRegistered(data) => {
                state
                    .snapshot
                    .participants
                    .entry(data.kind.as_str())
                    .or_default()
                    .registered += 1;
                state.participant_kinds.insert(participant_id, data.kind);
            }
            ParticipantEvent::ParticipantCheckedIn(_) => {
                if let Some(kind) = state.participant_kinds.get(&participant_id).copied() {
                    state
                        .snapshot
                        .participants
                        .entry(kind.as_str())
                        .or_default()
                        .checked_in += 1;
                }
            }
        }
    }
}

#[async_trait]
impl Projection for TicketSalesView {
    fn name(&self) -> &'static str {
        "TicketSalesView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        let id = event.aggregate_id;

        match event.aggregate_type.as_str() {
            "Order" => Self::apply_order(&mut state, serde_json::from_value(event.payload.clone())?),
            "Ticket" => {
                Self::apply_ticket(&mut state, id, serde_json::from_value(event.payload.clone())?)
            }
            "Participant" => Self::apply_participant(
                &mut state,
                id,
                serde_json::from_value(event.payload.clone())?,
            ),
            _ => {}
        }

        state.position = state.position.advance(event.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = SalesState::default();
        Ok(())
    }
}
