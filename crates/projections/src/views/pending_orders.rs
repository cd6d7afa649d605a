//! Orders that still hold capacity: placed and not yet fulfilled, expired or
//! cancelled.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{OrderEvent, TicketTypeId};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// A placed order that has not reached a final state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    pub order_id: AggregateId,
    pub expires_at: DateTime<Utc>,

    /// Set once payment is confirmed; the order holds its tickets until
    /// issuance regardless of the deadline.
    pub paid: bool,

    pub quantities: HashMap<TicketTypeId, u32>,
}

impl PendingOrder {
    fn holds_at(&self, now: DateTime<Utc>) -> bool {
        self.paid || self.expires_at > now
    }
}

struct PendingOrdersState {
    orders: HashMap<AggregateId, PendingOrder>,
    position: ProjectionPosition,
}

/// Read model of orders awaiting payment or issuance.
///
/// Checkout uses it to count tickets held by unexpired orders, and the
/// expiry worker uses it to find orders whose deadline has passed.
#[derive(Clone)]
pub struct PendingOrdersView {
    state: Arc<RwLock<PendingOrdersState>>,
}

impl PendingOrdersView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(PendingOrdersState {
                orders: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn get(&self, order_id: AggregateId) -> Option<PendingOrder> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Tickets of `ticket_type_id` held by orders that can still be paid.
    pub async fn held_quantity(&self, ticket_type_id: &TicketTypeId, now: DateTime<Utc>) -> u32 {
        self.state
            .read()
            .await
            .orders
            .values()
            .filter(|order| order.holds_at(now))
            .filter_map(|order| order.quantities.get(ticket_type_id))
            .sum()
    }

    /// Held quantities for every ticket type.
    pub async fn held_by_type(&self, now: DateTime<Utc>) -> HashMap<TicketTypeId, u32> {
        let state = self.state.read().await;
        let mut held: HashMap<TicketTypeId, u32> = HashMap::new();
        for order in state.orders.values().filter(|o| o.holds_at(now)) {
            for (ticket_type_id, quantity) in &order.quantities {
                *held.entry(ticket_type_id.clone()).or_default() += quantity;
            }
        }
        held
    }

    /// Unpaid orders whose deadline is at or before `now`, oldest first.
    pub async fn overdue(&self, now: DateTime<Utc>) -> Vec<AggregateId> {
        let state = self.state.read().await;
        let mut overdue: Vec<_> = state
            .orders
            .values()
            .filter(|order| !order.paid && order.expires_at <= now)
            .map(|order| (order.expires_at, order.order_id))
            .collect();
        overdue.sort();
        overdue.into_iter().map(|(_, id)| id).collect()
    }
}

impl Default for PendingOrdersView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for PendingOrdersView {
    fn name(&self) -> &'static str {
        "PendingOrdersView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;

        if event.aggregate_type == "Order" {
            let order_event: OrderEvent = serde_json::from_value(event.payload.clone())?;
            let order_id = event.aggregate_id;

            match order_event {
                OrderEvent::OrderPlaced(data) => {
                    let mut quantities: HashMap<TicketTypeId, u32> = HashMap::new();
                    for line in data.lines {
                        *quantities.entry(line.ticket_type_id).or_default() += line.quantity;
                    }
                    state.orders.insert(
                        order_id,
                        PendingOrder {
                            order_id,
                            expires_at: data.expires_at,
                            paid: false,
                            quantities,
                        },
                    );
                }
                OrderEvent::PaymentConfirmed(_) => {
                    if let Some(order) = state.orders.get_mut(&order_id) {
                        order.paid = true;
                    }
                }
                OrderEvent::TicketsIssued(_)
                | OrderEvent::OrderExpired(_)
                | OrderEvent::OrderCancelled(_) => {
                    state.orders.remove(&order_id);
                }
                OrderEvent::PaymentInitiated(_) | OrderEvent::LatePaymentRefunded(_) => {}
            }
        }

        state.position = state.position.advance(event.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.orders.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}
