//! Applying verified payment webhooks to orders.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{
    AccessCodeSigner, CancelOrder, CommandContext, ConfirmPayment, Currency, DomainError,
    ExpireOrder, Order, OrderService, OrderState, RecordLatePaymentRefund,
};
use event_store::EventStore;
use serde::Serialize;

use crate::error::{FulfillmentError, Result};
use crate::gateway::PaymentGateway;
use crate::issuance::TicketIssuer;
use crate::webhook::{PaymentEventData, WebhookEvent, WebhookPayload};

/// Attempts per delivery when another writer changes the order mid-flight.
const MAX_ATTEMPTS: usize = 3;

pub const MISMATCH_REASON: &str = "payment did not match order";

/// What a webhook delivery did. Every variant is acknowledged to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FulfillmentOutcome {
    /// This event id was processed before.
    Duplicate,

    /// Nothing to do: unknown order, unhandled type, or a state the event
    /// no longer applies to.
    Ignored,

    Fulfilled { ticket_ids: Vec<AggregateId> },
    AlreadyFulfilled,

    /// The payment could not be accepted and was returned.
    Refunded { refund_id: String },

    Cancelled,
    Expired,
}

impl FulfillmentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentOutcome::Duplicate => "duplicate",
            FulfillmentOutcome::Ignored => "ignored",
            FulfillmentOutcome::Fulfilled { .. } => "fulfilled",
            FulfillmentOutcome::AlreadyFulfilled => "already_fulfilled",
            FulfillmentOutcome::Refunded { .. } => "refunded",
            FulfillmentOutcome::Cancelled => "cancelled",
            FulfillmentOutcome::Expired => "expired",
        }
    }
}

pub struct FulfillmentService<S: EventStore, G: PaymentGateway> {
    store: S,
    orders: OrderService<S>,
    issuer: TicketIssuer<S>,
    gateway: G,
}

impl<S: EventStore + Clone, G: PaymentGateway> FulfillmentService<S, G> {
    pub fn new(store: S, gateway: G, signer: AccessCodeSigner) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            issuer: TicketIssuer::new(store.clone(), signer),
            store,
            gateway,
        }
    }
}

impl<S: EventStore, G: PaymentGateway> FulfillmentService<S, G> {
    /// Applies a verified webhook event. Safe to call again with the same
    /// event: redeliveries end as [`FulfillmentOutcome::Duplicate`] or find
    /// the work already done.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, event_type = event.event_type()))]
    pub async fn handle_event(
        &self,
        event: &WebhookEvent,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome> {
        let started = Instant::now();
        let result = self.dispatch(event, now).await;
        metrics::histogram!("fulfillment_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                metrics::counter!("fulfillment_outcomes_total", "outcome" => outcome.as_str())
                    .increment(1);
                tracing::info!(outcome = outcome.as_str(), "webhook handled");
            }
            Err(e) => tracing::error!(error = %e, "webhook handling failed"),
        }
        result
    }

    async fn dispatch(&self, event: &WebhookEvent, now: DateTime<Utc>) -> Result<FulfillmentOutcome> {
        let Some(data) = event.data() else {
            return Ok(FulfillmentOutcome::Ignored);
        };

        let mut attempt = 1;
        loop {
            if self
                .store
                .has_idempotency_key(&event.id)
                .await
                .map_err(DomainError::from)?
            {
                return self.redelivered(data, now).await;
            }

            match self.apply(event, data, now).await {
                Err(e) if e.is_conflict() && attempt < MAX_ATTEMPTS => {
                    tracing::debug!(attempt, "order changed concurrently, retrying");
                    attempt += 1;
                }
                Err(FulfillmentError::Domain(e)) if e.is_duplicate() => {
                    return Ok(FulfillmentOutcome::Duplicate);
                }
                other => return other,
            }
        }
    }

    /// A delivery whose writes were already recorded. The only work that can
    /// be left is issuance after a confirmed payment.
    async fn redelivered(
        &self,
        data: &PaymentEventData,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome> {
        match self.orders.get_order(data.order_id).await? {
            Some(order)
                if order.state() == OrderState::Paid
                    && order.payment_reference() == Some(data.reference.as_str()) =>
            {
                let ticket_ids = self.issuer.issue(&order, now).await?;
                Ok(FulfillmentOutcome::Fulfilled { ticket_ids })
            }
            _ => Ok(FulfillmentOutcome::Duplicate),
        }
    }

    async fn apply(
        &self,
        event: &WebhookEvent,
        data: &PaymentEventData,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome> {
        let Some(order) = self.orders.get_order(data.order_id).await? else {
            tracing::warn!(order_id = %data.order_id, "webhook for unknown order");
            return Ok(FulfillmentOutcome::Ignored);
        };

        let ctx = CommandContext::new()
            .idempotency_key(event.id.clone())
            .correlation_id(event.id.clone());

        match &event.payload {
            WebhookPayload::PaymentSucceeded(_) => {
                self.payment_succeeded(&order, data, ctx, now).await
            }
            WebhookPayload::PaymentFailed(_) => {
                if order.state() != OrderState::PendingPayment || !same_session(&order, data) {
                    return Ok(FulfillmentOutcome::Ignored);
                }
                let reason = data
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "payment failed".to_string());
                self.orders
                    .cancel_order(CancelOrder {
                        order_id: data.order_id,
                        reason,
                        cancelled_at: now,
                    })
                    .await?;
                Ok(FulfillmentOutcome::Cancelled)
            }
            WebhookPayload::CheckoutExpired(_) => {
                if order.state() != OrderState::PendingPayment || !same_session(&order, data) {
                    return Ok(FulfillmentOutcome::Ignored);
                }
                if order.is_overdue(now) {
                    self.orders
                        .expire_order(ExpireOrder {
                            order_id: data.order_id,
                            now,
                        })
                        .await?;
                    Ok(FulfillmentOutcome::Expired)
                } else {
                    self.orders
                        .cancel_order(CancelOrder {
                            order_id: data.order_id,
                            reason: "checkout session expired".to_string(),
                            cancelled_at: now,
                        })
                        .await?;
                    Ok(FulfillmentOutcome::Cancelled)
                }
            }
            WebhookPayload::Other(_) => Ok(FulfillmentOutcome::Ignored),
        }
    }

    async fn payment_succeeded(
        &self,
        order: &Order,
        data: &PaymentEventData,
        ctx: CommandContext,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome> {
        let order_id = data.order_id;

        match order.state() {
            OrderState::PendingPayment => {
                let currency = Currency::parse(&data.currency);
                if currency.as_ref() != Some(order.currency())
                    || data.amount != order.total()
                    || !same_session(order, data)
                {
                    tracing::warn!(
                        %order_id,
                        amount = %data.amount,
                        currency = %data.currency,
                        reference = %data.reference,
                        "payment does not match order"
                    );
                    self.orders
                        .cancel_order(CancelOrder {
                            order_id,
                            reason: MISMATCH_REASON.to_string(),
                            cancelled_at: now,
                        })
                        .await?;
                    return self.refund(order_id, data, ctx, now).await;
                }

                if order.is_overdue(now) {
                    tracing::info!(%order_id, "payment arrived after the deadline");
                    self.orders
                        .expire_order(ExpireOrder { order_id, now })
                        .await?;
                    return self.refund(order_id, data, ctx, now).await;
                }

                let confirmed = self
                    .orders
                    .confirm_payment(
                        ConfirmPayment {
                            order_id,
                            reference: data.reference.clone(),
                            amount: data.amount,
                            currency: order.currency().clone(),
                            paid_at: now,
                        },
                        ctx,
                    )
                    .await?;
                let ticket_ids = self.issuer.issue(&confirmed.aggregate, now).await?;
                Ok(FulfillmentOutcome::Fulfilled { ticket_ids })
            }
            OrderState::Paid => {
                if order.payment_reference() != Some(data.reference.as_str()) {
                    tracing::warn!(%order_id, reference = %data.reference, "second payment for a paid order");
                    return Ok(FulfillmentOutcome::Ignored);
                }
                // A previous delivery stopped between confirmation and issuance.
                let ticket_ids = self.issuer.issue(order, now).await?;
                Ok(FulfillmentOutcome::Fulfilled { ticket_ids })
            }
            OrderState::Fulfilled => {
                if order.payment_reference() != Some(data.reference.as_str()) {
                    tracing::warn!(%order_id, reference = %data.reference, "second payment for a fulfilled order");
                }
                Ok(FulfillmentOutcome::AlreadyFulfilled)
            }
            OrderState::Expired | OrderState::Cancelled => {
                if order.was_refunded(&data.reference) {
                    return Ok(FulfillmentOutcome::Ignored);
                }
                self.refund(order_id, data, ctx, now).await
            }
        }
    }

    async fn refund(
        &self,
        order_id: AggregateId,
        data: &PaymentEventData,
        ctx: CommandContext,
        now: DateTime<Utc>,
    ) -> Result<FulfillmentOutcome> {
        let receipt = self
            .gateway
            .refund(&data.reference, data.amount)
            .await
            .map_err(FulfillmentError::GatewayUnavailable)?;

        self.orders
            .record_late_payment_refund(
                RecordLatePaymentRefund {
                    order_id,
                    reference: data.reference.clone(),
                    refund_id: receipt.refund_id.clone(),
                    amount: data.amount,
                    refunded_at: now,
                },
                ctx,
            )
            .await?;

        metrics::counter!("payments_refunded_total").increment(1);
        tracing::info!(%order_id, refund_id = %receipt.refund_id, "payment refunded");
        Ok(FulfillmentOutcome::Refunded {
            refund_id: receipt.refund_id,
        })
    }
}

/// True if the event is about the checkout session recorded on the order,
/// or the order has none yet.
fn same_session(order: &Order, data: &PaymentEventData) -> bool {
    order
        .payment_reference()
        .is_none_or(|reference| reference == data.reference)
}
