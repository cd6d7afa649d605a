//! Order service providing a simplified API for order operations.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{Command, CommandContext, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    CancelOrder, ConfirmPayment, ExpireOrder, IssueTickets, Order, PlaceOrder,
    RecordLatePaymentRefund, RecordPaymentInitiation,
};

/// Service for managing orders.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute(cmd.aggregate_id(), |order| order.place(&cmd))
            .await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            total = %result.aggregate.total(),
            tickets = result.aggregate.total_quantity(),
            "order placed"
        );
        Ok(result)
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, reference = %cmd.gateway_reference))]
    pub async fn record_payment_initiation(
        &self,
        cmd: RecordPaymentInitiation,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |order| {
                order.initiate_payment(&cmd.gateway_reference, &cmd.checkout_url)
            })
            .await
    }

    /// Confirms a payment. `context` carries the webhook delivery id as the
    /// idempotency key so a redelivered notification writes nothing.
    #[tracing::instrument(skip(self, cmd, context), fields(order_id = %cmd.order_id, reference = %cmd.reference))]
    pub async fn confirm_payment(
        &self,
        cmd: ConfirmPayment,
        context: CommandContext,
    ) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute_with(cmd.aggregate_id(), context, |order| {
                order.confirm_payment(&cmd)
            })
            .await?;

        metrics::counter!("payments_confirmed_total").increment(1);
        Ok(result)
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, count = cmd.ticket_ids.len()))]
    pub async fn issue_tickets(
        &self,
        cmd: IssueTickets,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |order| {
                order.issue_tickets(cmd.ticket_ids.clone(), cmd.issued_at)
            })
            .await
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn expire_order(&self, cmd: ExpireOrder) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute(cmd.aggregate_id(), |order| order.expire(cmd.now))
            .await?;

        metrics::counter!("orders_expired_total").increment(1);
        tracing::info!("order expired");
        Ok(result)
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, reason = %cmd.reason))]
    pub async fn cancel_order(&self, cmd: CancelOrder) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute(cmd.aggregate_id(), |order| order.cancel(&cmd))
            .await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!("order cancelled");
        Ok(result)
    }

    #[tracing::instrument(skip(self, cmd, context), fields(order_id = %cmd.order_id, reference = %cmd.reference))]
    pub async fn record_late_payment_refund(
        &self,
        cmd: RecordLatePaymentRefund,
        context: CommandContext,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with(cmd.aggregate_id(), context, |order| {
                order.record_late_payment_refund(
                    &cmd.reference,
                    &cmd.refund_id,
                    cmd.amount,
                    cmd.refunded_at,
                )
            })
            .await
    }

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    /// Like [`OrderService::get_order`], failing when the order is missing.
    pub async fn require_order(&self, order_id: AggregateId) -> Result<Order, DomainError> {
        self.get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }
}
