//! Remaining capacity per ticket type, computed from the read models.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::{TicketType, TicketTypeId};
use event_store::EventStore;
use projections::{PendingOrdersView, ProjectionProcessor, TicketSalesView};

use crate::error::Result;

/// The projections that capacity checks, the expiry worker and the stats
/// endpoint read from, together with the processor that feeds them.
pub struct Availability<S: EventStore> {
    processor: Arc<ProjectionProcessor<S>>,
    pending: PendingOrdersView,
    sales: TicketSalesView,
}

impl<S: EventStore> Clone for Availability<S> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
            pending: self.pending.clone(),
            sales: self.sales.clone(),
        }
    }
}

impl<S: EventStore + Clone> Availability<S> {
    /// Wires fresh views to a processor reading `store`.
    pub fn new(store: S) -> Self {
        let pending = PendingOrdersView::new();
        let sales = TicketSalesView::new();
        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(pending.clone()));
        processor.register(Box::new(sales.clone()));

        Self {
            processor: Arc::new(processor),
            pending,
            sales,
        }
    }
}

impl<S: EventStore> Availability<S> {
    pub fn pending(&self) -> &PendingOrdersView {
        &self.pending
    }

    pub fn sales(&self) -> &TicketSalesView {
        &self.sales
    }

    pub fn processor(&self) -> &ProjectionProcessor<S> {
        &self.processor
    }

    /// Catches the views up with the event log.
    pub async fn refresh(&self) -> Result<u64> {
        Ok(self.processor.run_catch_up().await?)
    }

    /// Tickets of this type that can still be ordered, or `None` when the
    /// type has no capacity limit. Call [`Self::refresh`] first for an
    /// up-to-date answer.
    pub async fn remaining(&self, ticket_type: &TicketType, now: DateTime<Utc>) -> Option<u32> {
        let capacity = ticket_type.capacity?;
        let taken = self.taken(&ticket_type.id, now).await;
        Some(capacity.saturating_sub(taken))
    }

    /// Sold plus held by orders that can still be paid.
    pub async fn taken(&self, ticket_type_id: &TicketTypeId, now: DateTime<Utc>) -> u32 {
        self.sales.sold(ticket_type_id).await + self.pending.held_quantity(ticket_type_id, now).await
    }
}
