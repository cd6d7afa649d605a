//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::catalog::TicketTypeId;

use super::{
    Buyer, CancelOrder, ConfirmPayment, Currency, Money, OrderError, OrderEvent, OrderLine,
    OrderState, PlaceOrder, events::OrderPlacedData, merge_lines,
};

/// A ticket the order will produce once paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTicket {
    pub ticket_id: AggregateId,
    pub ticket_type_id: TicketTypeId,
    pub ticket_type_name: String,
}

/// Order aggregate root.
///
/// Tracks a purchase from placement through payment to ticket issuance, or
/// to expiry or cancellation when payment never arrives.
#[derive(Debug, Clone, Default)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    state: OrderState,
    buyer: Option<Buyer>,
    lines: Vec<OrderLine>,
    currency: Currency,
    total: Money,
    placed_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    payment_reference: Option<String>,
    checkout_url: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    ticket_ids: Vec<AggregateId>,
    closed_reason: Option<String>,
    refunded_references: Vec<String>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::PaymentInitiated(data) => {
                self.payment_reference = Some(data.gateway_reference);
                self.checkout_url = Some(data.checkout_url);
            }
            OrderEvent::PaymentConfirmed(data) => {
                self.state = OrderState::Paid;
                self.payment_reference = Some(data.reference);
                self.paid_at = Some(data.paid_at);
            }
            OrderEvent::TicketsIssued(data) => {
                self.state = OrderState::Fulfilled;
                self.ticket_ids = data.ticket_ids;
            }
            OrderEvent::OrderExpired(_) => {
                self.state = OrderState::Expired;
                self.closed_reason = Some("payment deadline passed".to_string());
            }
            OrderEvent::OrderCancelled(data) => {
                self.state = OrderState::Cancelled;
                self.closed_reason = Some(data.reason);
            }
            OrderEvent::LatePaymentRefunded(data) => {
                self.refunded_references.push(data.reference);
            }
        }
    }
}

// Query methods
impl Order {
    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn buyer(&self) -> Option<&Buyer> {
        self.buyer.as_ref()
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Gateway reference of the checkout session or confirmed payment.
    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn checkout_url(&self) -> Option<&str> {
        self.checkout_url.as_deref()
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn ticket_ids(&self) -> &[AggregateId] {
        &self.ticket_ids
    }

    /// Why the order was cancelled or expired.
    pub fn closed_reason(&self) -> Option<&str> {
        self.closed_reason.as_deref()
    }

    pub fn was_refunded(&self, reference: &str) -> bool {
        self.refunded_references.iter().any(|r| r == reference)
    }

    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Returns true if the order is still pending and its deadline has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.state == OrderState::PendingPayment && now >= self.expires_at
    }

    /// Tickets this order issues once paid.
    ///
    /// Ids are derived from the order id, so issuing twice targets the same
    /// ticket streams.
    pub fn planned_tickets(&self) -> Vec<PlannedTicket> {
        let Some(order_id) = self.id else {
            return Vec::new();
        };

        self.lines
            .iter()
            .flat_map(|line| {
                (0..line.quantity).map(move |index| PlannedTicket {
                    ticket_id: AggregateId::derived(
                        order_id,
                        &format!("{}:{index}", line.ticket_type_id),
                    ),
                    ticket_type_id: line.ticket_type_id.clone(),
                    ticket_type_name: line.ticket_type_name.clone(),
                })
            })
            .collect()
    }
}

// Command methods (return events)
impl Order {
    pub fn place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }

        cmd.buyer.validate()?;

        if cmd.lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        for line in &cmd.lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    ticket_type_id: line.ticket_type_id.clone(),
                    quantity: line.quantity,
                });
            }
            if line.unit_price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    ticket_type_id: line.ticket_type_id.clone(),
                    price: line.unit_price,
                });
            }
        }

        if cmd.expires_at <= cmd.placed_at {
            return Err(OrderError::InvalidDeadline);
        }

        let lines = merge_lines(cmd.lines.clone());
        let total = lines.iter().map(OrderLine::total_price).sum();

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: cmd.order_id,
            buyer: cmd.buyer.clone(),
            lines,
            currency: cmd.currency.clone(),
            total,
            placed_at: cmd.placed_at,
            expires_at: cmd.expires_at,
        })])
    }

    pub fn initiate_payment(
        &self,
        gateway_reference: &str,
        checkout_url: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.state.can_initiate_payment() {
            return Err(self.invalid_transition("initiate payment"));
        }
        if let Some(reference) = &self.payment_reference {
            return Err(OrderError::PaymentAlreadyInitiated {
                reference: reference.clone(),
            });
        }

        Ok(vec![OrderEvent::payment_initiated(
            gateway_reference,
            checkout_url,
        )])
    }

    pub fn confirm_payment(&self, cmd: &ConfirmPayment) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.state.can_confirm_payment() {
            return Err(self.invalid_transition("confirm payment"));
        }
        if cmd.paid_at >= self.expires_at {
            return Err(OrderError::DeadlinePassed {
                expires_at: self.expires_at,
            });
        }
        if cmd.currency != self.currency {
            return Err(OrderError::CurrencyMismatch {
                expected: self.currency.clone(),
                actual: cmd.currency.clone(),
            });
        }
        if cmd.amount != self.total {
            return Err(OrderError::AmountMismatch {
                expected: self.total,
                actual: cmd.amount,
            });
        }
        if let Some(expected) = &self.payment_reference
            && expected != &cmd.reference
        {
            return Err(OrderError::ReferenceMismatch {
                expected: expected.clone(),
                actual: cmd.reference.clone(),
            });
        }

        Ok(vec![OrderEvent::payment_confirmed(
            cmd.reference.clone(),
            cmd.amount,
            cmd.paid_at,
        )])
    }

    pub fn issue_tickets(
        &self,
        ticket_ids: Vec<AggregateId>,
        issued_at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.state.can_issue_tickets() {
            return Err(self.invalid_transition("issue tickets"));
        }
        let expected = self.total_quantity() as usize;
        if ticket_ids.len() != expected {
            return Err(OrderError::TicketCountMismatch {
                expected,
                actual: ticket_ids.len(),
            });
        }

        Ok(vec![OrderEvent::tickets_issued(ticket_ids, issued_at)])
    }

    pub fn expire(&self, now: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.state.can_expire() {
            return Err(self.invalid_transition("expire"));
        }
        if now < self.expires_at {
            return Err(OrderError::NotYetExpired {
                expires_at: self.expires_at,
            });
        }

        Ok(vec![OrderEvent::order_expired(now)])
    }

    pub fn cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.state.can_cancel() {
            return Err(self.invalid_transition("cancel"));
        }

        Ok(vec![OrderEvent::order_cancelled(
            cmd.reason.clone(),
            cmd.cancelled_at,
        )])
    }

    pub fn record_late_payment_refund(
        &self,
        reference: &str,
        refund_id: &str,
        amount: Money,
        refunded_at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.state.can_refund_late_payment() {
            return Err(self.invalid_transition("refund a late payment"));
        }
        if self.was_refunded(reference) {
            return Err(OrderError::AlreadyRefunded {
                reference: reference.to_string(),
            });
        }

        Ok(vec![OrderEvent::late_payment_refunded(
            reference,
            refund_id,
            amount,
            refunded_at,
        )])
    }

    fn ensure_placed(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        Ok(())
    }

    fn invalid_transition(&self, action: &'static str) -> OrderError {
        OrderError::InvalidStateTransition {
            current_state: self.state,
            action,
        }
    }
}

// Apply event helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.state = OrderState::PendingPayment;
        self.buyer = Some(data.buyer);
        self.lines = data.lines;
        self.currency = data.currency;
        self.total = data.total;
        self.placed_at = data.placed_at;
        self.expires_at = data.expires_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DomainEvent;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn place_cmd(order_id: AggregateId) -> PlaceOrder {
        PlaceOrder {
            order_id,
            buyer: Buyer::new("Ada Lovelace", "ada@example.com"),
            lines: vec![
                OrderLine::new("general", "General Admission", 2, Money::from_cents(19900)),
                OrderLine::new("workshop", "Workshop Day", 1, Money::from_cents(9900)),
            ],
            currency: Currency::default(),
            placed_at: t0(),
            expires_at: t0() + Duration::minutes(15),
        }
    }

    fn placed_order() -> Order {
        let mut order = Order::default();
        let events = order.place(&place_cmd(AggregateId::new())).unwrap();
        order.apply_events(events);
        order
    }

    fn confirm_cmd(order: &Order, reference: &str) -> ConfirmPayment {
        ConfirmPayment {
            order_id: order.id().unwrap(),
            reference: reference.to_string(),
            amount: order.total(),
            currency: order.currency().clone(),
            paid_at: t0() + Duration::minutes(5),
        }
    }

    fn paid_order() -> Order {
        let mut order = placed_order();
        order.apply_events(order.initiate_payment("cs_1", "https://pay/cs_1").unwrap());
        let events = order.confirm_payment(&confirm_cmd(&order, "cs_1")).unwrap();
        order.apply_events(events);
        order
    }

    #[test]
    fn place_computes_total() {
        let order = placed_order();
        assert_eq!(order.state(), OrderState::PendingPayment);
        assert_eq!(order.total().cents(), 2 * 19900 + 9900);
        assert_eq!(order.total_quantity(), 3);
        assert_eq!(order.expires_at(), t0() + Duration::minutes(15));
    }

    #[test]
    fn place_twice_fails() {
        let order = placed_order();
        let result = order.place(&place_cmd(AggregateId::new()));
        assert!(matches!(result, Err(OrderError::AlreadyPlaced)));
    }

    #[test]
    fn place_merges_duplicate_ticket_types() {
        let mut cmd = place_cmd(AggregateId::new());
        cmd.lines.push(OrderLine::new(
            "general",
            "General Admission",
            1,
            Money::from_cents(19900),
        ));

        let mut order = Order::default();
        order.apply_events(order.place(&cmd).unwrap());

        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.lines()[0].quantity, 3);
        assert_eq!(order.total().cents(), 3 * 19900 + 9900);
    }

    #[test]
    fn place_validates_input() {
        let order = Order::default();

        let mut cmd = place_cmd(AggregateId::new());
        cmd.lines.clear();
        assert!(matches!(order.place(&cmd), Err(OrderError::NoLines)));

        let mut cmd = place_cmd(AggregateId::new());
        cmd.lines[1].quantity = 0;
        assert!(matches!(
            order.place(&cmd),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));

        let mut cmd = place_cmd(AggregateId::new());
        cmd.lines[0].unit_price = Money::from_cents(-1);
        assert!(matches!(
            order.place(&cmd),
            Err(OrderError::InvalidPrice { .. })
        ));

        let mut cmd = place_cmd(AggregateId::new());
        cmd.buyer.email = "not-an-email".to_string();
        assert!(matches!(
            order.place(&cmd),
            Err(OrderError::InvalidBuyer(_))
        ));

        let mut cmd = place_cmd(AggregateId::new());
        cmd.expires_at = cmd.placed_at;
        assert!(matches!(
            order.place(&cmd),
            Err(OrderError::InvalidDeadline)
        ));
    }

    #[test]
    fn commands_on_unplaced_order_fail() {
        let order = Order::default();
        assert!(matches!(
            order.initiate_payment("cs_1", "url"),
            Err(OrderError::NotPlaced)
        ));
        assert!(matches!(order.expire(t0()), Err(OrderError::NotPlaced)));
    }

    #[test]
    fn payment_initiation_happens_once() {
        let mut order = placed_order();
        order.apply_events(order.initiate_payment("cs_1", "https://pay/cs_1").unwrap());
        assert_eq!(order.payment_reference(), Some("cs_1"));
        assert_eq!(order.checkout_url(), Some("https://pay/cs_1"));

        let result = order.initiate_payment("cs_2", "https://pay/cs_2");
        assert!(matches!(
            result,
            Err(OrderError::PaymentAlreadyInitiated { reference }) if reference == "cs_1"
        ));
    }

    #[test]
    fn confirm_payment_moves_to_paid() {
        let order = paid_order();
        assert_eq!(order.state(), OrderState::Paid);
        assert_eq!(order.paid_at(), Some(t0() + Duration::minutes(5)));
    }

    #[test]
    fn confirm_payment_rejects_amount_mismatch() {
        let order = placed_order();
        let mut cmd = confirm_cmd(&order, "cs_1");
        cmd.amount = Money::from_cents(100);

        assert!(matches!(
            order.confirm_payment(&cmd),
            Err(OrderError::AmountMismatch { actual, .. }) if actual.cents() == 100
        ));
    }

    #[test]
    fn confirm_payment_rejects_currency_mismatch() {
        let order = placed_order();
        let mut cmd = confirm_cmd(&order, "cs_1");
        cmd.currency = Currency::parse("EUR").unwrap();

        assert!(matches!(
            order.confirm_payment(&cmd),
            Err(OrderError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn confirm_payment_rejects_foreign_reference() {
        let mut order = placed_order();
        order.apply_events(order.initiate_payment("cs_1", "https://pay/cs_1").unwrap());

        assert!(matches!(
            order.confirm_payment(&confirm_cmd(&order, "cs_other")),
            Err(OrderError::ReferenceMismatch { .. })
        ));
    }

    #[test]
    fn confirm_payment_at_deadline_is_late() {
        let order = placed_order();
        let mut cmd = confirm_cmd(&order, "cs_1");
        cmd.paid_at = order.expires_at();

        assert!(matches!(
            order.confirm_payment(&cmd),
            Err(OrderError::DeadlinePassed { .. })
        ));

        cmd.paid_at = order.expires_at() - Duration::seconds(1);
        assert!(order.confirm_payment(&cmd).is_ok());
    }

    #[test]
    fn issue_tickets_requires_paid_and_full_count() {
        let order = placed_order();
        assert!(matches!(
            order.issue_tickets(vec![], t0()),
            Err(OrderError::InvalidStateTransition { .. })
        ));

        let mut order = paid_order();
        assert!(matches!(
            order.issue_tickets(vec![AggregateId::new()], t0()),
            Err(OrderError::TicketCountMismatch {
                expected: 3,
                actual: 1
            })
        ));

        let ids: Vec<_> = order.planned_tickets().iter().map(|t| t.ticket_id).collect();
        let events = order.issue_tickets(ids.clone(), t0()).unwrap();
        assert_eq!(events[0].event_type(), "TicketsIssued");
        order.apply_events(events);
        assert_eq!(order.state(), OrderState::Fulfilled);
        assert_eq!(order.ticket_ids(), ids.as_slice());
    }

    #[test]
    fn planned_tickets_are_deterministic_and_distinct() {
        let order = placed_order();
        let first = order.planned_tickets();
        let second = order.planned_tickets();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_ne!(first[0].ticket_id, first[1].ticket_id);
        assert_eq!(first[2].ticket_type_id.as_str(), "workshop");
    }

    #[test]
    fn expire_only_after_deadline() {
        let mut order = placed_order();
        assert!(!order.is_overdue(t0() + Duration::minutes(14)));
        assert!(matches!(
            order.expire(t0() + Duration::minutes(14)),
            Err(OrderError::NotYetExpired { .. })
        ));

        let deadline = t0() + Duration::minutes(15);
        assert!(order.is_overdue(deadline));
        order.apply_events(order.expire(deadline).unwrap());
        assert_eq!(order.state(), OrderState::Expired);
        assert!(order.state().is_terminal());

        assert!(matches!(
            order.expire(deadline),
            Err(OrderError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn cancel_only_while_pending() {
        let mut order = placed_order();
        let cancel = CancelOrder {
            order_id: order.id().unwrap(),
            reason: "payment declined".to_string(),
            cancelled_at: t0(),
        };
        order.apply_events(order.cancel(&cancel).unwrap());
        assert_eq!(order.state(), OrderState::Cancelled);
        assert_eq!(order.closed_reason(), Some("payment declined"));

        let paid = paid_order();
        assert!(matches!(
            paid.cancel(&cancel),
            Err(OrderError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn late_payment_refund_recorded_once() {
        let mut order = placed_order();
        order.apply_events(order.expire(t0() + Duration::hours(1)).unwrap());

        let events = order
            .record_late_payment_refund("cs_1", "re_1", order.total(), t0())
            .unwrap();
        order.apply_events(events);
        assert!(order.was_refunded("cs_1"));

        assert!(matches!(
            order.record_late_payment_refund("cs_1", "re_2", order.total(), t0()),
            Err(OrderError::AlreadyRefunded { .. })
        ));
    }

    #[test]
    fn late_payment_refund_rejected_for_open_orders() {
        let order = paid_order();
        assert!(matches!(
            order.record_late_payment_refund("cs_1", "re_1", order.total(), t0()),
            Err(OrderError::InvalidStateTransition { .. })
        ));
    }
}
