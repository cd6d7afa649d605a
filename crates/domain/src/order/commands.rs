//! Order commands.

use chrono::{DateTime, Utc};
use common::AggregateId;

use crate::command::Command;

use super::{Buyer, Currency, Money, Order, OrderLine};

/// Place a new order awaiting payment.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,
    pub buyer: Buyer,
    pub lines: Vec<OrderLine>,
    pub currency: Currency,
    pub placed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Record the checkout session opened at the gateway.
#[derive(Debug, Clone)]
pub struct RecordPaymentInitiation {
    pub order_id: AggregateId,
    pub gateway_reference: String,
    pub checkout_url: String,
}

/// Confirm that the gateway collected the payment.
#[derive(Debug, Clone)]
pub struct ConfirmPayment {
    pub order_id: AggregateId,
    pub reference: String,
    pub amount: Money,
    pub currency: Currency,
    pub paid_at: DateTime<Utc>,
}

/// Record the tickets issued for a paid order.
#[derive(Debug, Clone)]
pub struct IssueTickets {
    pub order_id: AggregateId,
    pub ticket_ids: Vec<AggregateId>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExpireOrder {
    pub order_id: AggregateId,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: AggregateId,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

/// Record that a payment received after the order closed was refunded.
#[derive(Debug, Clone)]
pub struct RecordLatePaymentRefund {
    pub order_id: AggregateId,
    pub reference: String,
    pub refund_id: String,
    pub amount: Money,
    pub refunded_at: DateTime<Utc>,
}

macro_rules! order_command {
    ($($command:ty),* $(,)?) => {
        $(
            impl Command for $command {
                type Aggregate = Order;

                fn aggregate_id(&self) -> AggregateId {
                    self.order_id
                }
            }
        )*
    };
}

order_command!(
    PlaceOrder,
    RecordPaymentInitiation,
    ConfirmPayment,
    IssueTickets,
    ExpireOrder,
    CancelOrder,
    RecordLatePaymentRefund,
);
