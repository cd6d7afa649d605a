//! Checkout, payment confirmation and ticket fulfillment.
//!
//! This crate connects the order aggregate to the outside world:
//! - [`CheckoutService`] turns a cart into an order and a hosted checkout session
//! - [`FulfillmentService`] applies verified payment webhooks and issues tickets
//! - [`ExpiryWorker`] expires orders whose payment deadline has passed
//!
//! Capacity is admitted against the [`Availability`] read models.

pub mod availability;
pub mod checkout;
pub mod error;
pub mod expiry;
pub mod fulfillment;
pub mod gateway;
pub mod issuance;
pub mod webhook;

pub use availability::Availability;
pub use checkout::{Cart, CartItem, CheckoutReceipt, CheckoutService, CheckoutSettings};
pub use error::{FulfillmentError, GatewayError, Result};
pub use expiry::ExpiryWorker;
pub use fulfillment::{FulfillmentOutcome, FulfillmentService};
pub use gateway::{
    CheckoutRequest, CheckoutSession, HttpGatewayConfig, HttpPaymentGateway,
    InMemoryPaymentGateway, PaymentGateway, RefundReceipt,
};
pub use issuance::TicketIssuer;
pub use webhook::{
    PaymentEventData, SIGNATURE_HEADER, WebhookError, WebhookEvent, WebhookPayload,
    WebhookVerifier,
};
