//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// PendingPayment ──► Paid ──► Fulfilled
///       │
///       ├──► Expired
///       └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Placed and waiting for the gateway to confirm payment.
    #[default]
    PendingPayment,

    /// Payment confirmed, tickets not yet issued.
    Paid,

    /// Tickets issued (terminal state).
    Fulfilled,

    /// Deadline passed without payment (terminal state).
    Expired,

    /// Cancelled before payment (terminal state).
    Cancelled,
}

impl OrderState {
    pub fn can_initiate_payment(&self) -> bool {
        matches!(self, OrderState::PendingPayment)
    }

    pub fn can_confirm_payment(&self) -> bool {
        matches!(self, OrderState::PendingPayment)
    }

    pub fn can_issue_tickets(&self) -> bool {
        matches!(self, OrderState::Paid)
    }

    pub fn can_expire(&self) -> bool {
        matches!(self, OrderState::PendingPayment)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderState::PendingPayment)
    }

    /// A payment arriving in these states is refunded instead of confirmed.
    pub fn can_refund_late_payment(&self) -> bool {
        matches!(self, OrderState::Expired | OrderState::Cancelled)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Fulfilled | OrderState::Expired | OrderState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::PendingPayment => "PendingPayment",
            OrderState::Paid => "Paid",
            OrderState::Fulfilled => "Fulfilled",
            OrderState::Expired => "Expired",
            OrderState::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
