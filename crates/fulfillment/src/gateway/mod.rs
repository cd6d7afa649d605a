//! Payment gateway adapter.
//!
//! The gateway hosts the checkout page, so card data never reaches this
//! service. It reports outcomes back through signed webhooks (see
//! [`crate::webhook`]).

mod http;
mod memory;

pub use http::{HttpGatewayConfig, HttpPaymentGateway};
pub use memory::{InMemoryPaymentGateway, RecordedRefund};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Currency, Money};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub order_id: AggregateId,
    pub amount: Money,
    pub currency: Currency,
    pub description: String,
    pub customer_email: String,
    pub expires_at: DateTime<Utc>,
}

/// A hosted checkout page opened for one order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub reference: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefundReceipt {
    pub refund_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a checkout session the buyer is redirected to.
    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Returns `amount` of the payment made through session `reference`.
    async fn refund(&self, reference: &str, amount: Money) -> Result<RefundReceipt, GatewayError>;
}

#[async_trait]
impl<G: PaymentGateway + ?Sized> PaymentGateway for Arc<G> {
    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        (**self).create_checkout(request).await
    }

    async fn refund(&self, reference: &str, amount: Money) -> Result<RefundReceipt, GatewayError> {
        (**self).refund(reference, amount).await
    }
}
