//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{Buyer, Currency, Money, OrderLine};

/// Events recorded on an order stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderPlaced(OrderPlacedData),

    /// A checkout session was opened at the payment gateway.
    PaymentInitiated(PaymentInitiatedData),

    PaymentConfirmed(PaymentConfirmedData),

    TicketsIssued(TicketsIssuedData),

    OrderExpired(OrderExpiredData),

    OrderCancelled(OrderCancelledData),

    /// A payment that arrived after the order closed was sent back.
    LatePaymentRefunded(LatePaymentRefundedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::PaymentInitiated(_) => "PaymentInitiated",
            OrderEvent::PaymentConfirmed(_) => "PaymentConfirmed",
            OrderEvent::TicketsIssued(_) => "TicketsIssued",
            OrderEvent::OrderExpired(_) => "OrderExpired",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::LatePaymentRefunded(_) => "LatePaymentRefunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub buyer: Buyer,
    pub lines: Vec<OrderLine>,
    pub currency: Currency,
    pub total: Money,
    pub placed_at: DateTime<Utc>,

    /// Payment must be confirmed strictly before this instant.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitiatedData {
    pub gateway_reference: String,
    pub checkout_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmedData {
    pub reference: String,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketsIssuedData {
    pub ticket_ids: Vec<AggregateId>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderExpiredData {
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatePaymentRefundedData {
    pub reference: String,
    pub refund_id: String,
    pub amount: Money,
    pub refunded_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn payment_initiated(
        gateway_reference: impl Into<String>,
        checkout_url: impl Into<String>,
    ) -> Self {
        OrderEvent::PaymentInitiated(PaymentInitiatedData {
            gateway_reference: gateway_reference.into(),
            checkout_url: checkout_url.into(),
        })
    }

    pub fn payment_confirmed(
        reference: impl Into<String>,
        amount: Money,
        paid_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::PaymentConfirmed(PaymentConfirmedData {
            reference: reference.into(),
            amount,
            paid_at,
        })
    }

    pub fn tickets_issued(ticket_ids: Vec<AggregateId>, issued_at: DateTime<Utc>) -> Self {
        OrderEvent::TicketsIssued(TicketsIssuedData {
            ticket_ids,
            issued_at,
        })
    }

    pub fn order_expired(expired_at: DateTime<Utc>) -> Self {
        OrderEvent::OrderExpired(OrderExpiredData { expired_at })
    }

    pub fn order_cancelled(reason: impl Into<String>, cancelled_at: DateTime<Utc>) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            reason: reason.into(),
            cancelled_at,
        })
    }

    pub fn late_payment_refunded(
        reference: impl Into<String>,
        refund_id: impl Into<String>,
        amount: Money,
        refunded_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::LatePaymentRefunded(LatePaymentRefundedData {
            reference: reference.into(),
            refund_id: refund_id.into(),
            amount,
            refunded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_form_is_tagged() {
        let event = OrderEvent::order_cancelled("payment declined", Utc::now());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "OrderCancelled");
        assert_eq!(json["data"]["reason"], "payment declined");

        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_type(), "OrderCancelled");
    }

    #[test]
    fn placed_event_keeps_lines_and_deadline() {
        let placed_at = Utc::now();
        let event = OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: AggregateId::new(),
            buyer: Buyer::new("Ada", "ada@example.com"),
            lines: vec![OrderLine::new(
                "general",
                "General Admission",
                2,
                Money::from_cents(19900),
            )],
            currency: Currency::default(),
            total: Money::from_cents(39800),
            placed_at,
            expires_at: placed_at + chrono::Duration::minutes(15),
        });

        let json = serde_json::to_string(&event).unwrap();
        let OrderEvent::OrderPlaced(data) = serde_json::from_str(&json).unwrap() else {
            panic!("expected OrderPlaced");
        };
        assert_eq!(data.lines[0].quantity, 2);
        assert_eq!(data.total.cents(), 39800);
        assert_eq!(data.expires_at, placed_at + chrono::Duration::minutes(15));
    }
}
