use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::Money;
use tokio::sync::Mutex;

use super::{CheckoutRequest, CheckoutSession, PaymentGateway, RefundReceipt};
use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRefund {
    pub refund_id: String,
    pub reference: String,
    pub amount: Money,
}

#[derive(Debug, Default)]
struct GatewayState {
    sessions: HashMap<String, CheckoutRequest>,
    refunds: Vec<RecordedRefund>,
    next_session: u32,
    fail_checkout: bool,
    fail_refund: bool,
}

/// Gateway double that keeps sessions and refunds in memory.
///
/// References are handed out in order (`cs_0001`, `cs_0002`, ...), so tests
/// can predict them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent checkout calls fail with a transport error.
    pub async fn set_fail_checkout(&self, fail: bool) {
        self.state.lock().await.fail_checkout = fail;
    }

    /// Makes subsequent refund calls fail with a transport error.
    pub async fn set_fail_refund(&self, fail: bool) {
        self.state.lock().await.fail_refund = fail;
    }

    pub async fn session(&self, reference: &str) -> Option<CheckoutRequest> {
        self.state.lock().await.sessions.get(reference).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn refunds(&self) -> Vec<RecordedRefund> {
        self.state.lock().await.refunds.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut state = self.state.lock().await;
        if state.fail_checkout {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }

        state.next_session += 1;
        let reference = format!("cs_{:04}", state.next_session);
        state.sessions.insert(reference.clone(), request);

        Ok(CheckoutSession {
            redirect_url: format!("https://pay.example/checkout/{reference}"),
            reference,
        })
    }

    async fn refund(&self, reference: &str, amount: Money) -> Result<RefundReceipt, GatewayError> {
        let mut state = self.state.lock().await;
        if state.fail_refund {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        if !state.sessions.contains_key(reference) {
            return Err(GatewayError::Rejected {
                status: 404,
                message: format!("no checkout session {reference}"),
            });
        }
        if state.refunds.iter().any(|r| r.reference == reference) {
            return Err(GatewayError::Rejected {
                status: 409,
                message: format!("{reference} already refunded"),
            });
        }

        let refund_id = format!("re_{:04}", state.refunds.len() + 1);
        state.refunds.push(RecordedRefund {
            refund_id: refund_id.clone(),
            reference: reference.to_string(),
            amount,
        });
        Ok(RefundReceipt { refund_id })
    }
}
