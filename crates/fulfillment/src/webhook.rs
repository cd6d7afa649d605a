//! Verification and parsing of payment gateway webhooks.
//!
//! Every delivery carries a `Gateway-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The signature is
//! HMAC-SHA256 over `"{t}.{raw body}"` with the shared webhook secret.
//! More than one `v1` entry may be present while the secret is rotated.

use chrono::{DateTime, Duration, Utc};
use common::AggregateId;
use domain::Money;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Gateway-Signature";

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Webhook secret must not be empty")]
    EmptySecret,

    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Signature timestamp {timestamp} is outside the tolerance window")]
    StaleTimestamp { timestamp: i64 },

    #[error("No signature matches the payload")]
    SignatureMismatch,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

#[derive(Clone)]
pub struct WebhookVerifier {
    mac: HmacSha256,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>, tolerance: Duration) -> Result<Self, WebhookError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(WebhookError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::EmptySecret)?;
        Ok(Self { mac, tolerance })
    }

    /// Builds a header value for `body` signed at `timestamp`.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> String {
        format!("t={timestamp},v1={}", hex::encode(self.digest(timestamp, body)))
    }

    /// Checks `header` against `body`, then decodes the event.
    pub fn verify_event(
        &self,
        header: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, WebhookError> {
        self.verify(header, body, now)?;
        WebhookEvent::parse(body)
    }

    pub fn verify(&self, header: &str, body: &[u8], now: DateTime<Utc>) -> Result<(), WebhookError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or(WebhookError::MalformedHeader)?;
            match key {
                "t" => {
                    let t = value
                        .parse::<i64>()
                        .map_err(|_| WebhookError::MalformedHeader)?;
                    timestamp = Some(t);
                }
                "v1" => {
                    candidates.push(hex::decode(value).map_err(|_| WebhookError::MalformedHeader)?)
                }
                // Other schemes are skipped.
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
        if candidates.is_empty() {
            return Err(WebhookError::MalformedHeader);
        }

        let age = now.timestamp() - timestamp;
        if age.abs() > self.tolerance.num_seconds() {
            return Err(WebhookError::StaleTimestamp { timestamp });
        }

        let expected = self.digest(timestamp, body);
        let matched = candidates
            .iter()
            .fold(0u8, |acc, c| acc | expected[..].ct_eq(&c[..]).unwrap_u8());
        if matched == 1 {
            Ok(())
        } else {
            Err(WebhookError::SignatureMismatch)
        }
    }

    fn digest(&self, timestamp: i64, body: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Payment details shared by all payment-related webhook types.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentEventData {
    /// Checkout session the event is about.
    pub reference: String,
    pub order_id: AggregateId,
    #[serde(rename = "amount_cents")]
    pub amount: Money,
    pub currency: String,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookPayload {
    PaymentSucceeded(PaymentEventData),
    PaymentFailed(PaymentEventData),
    CheckoutExpired(PaymentEventData),

    /// A type this service does not act on; acknowledged and dropped.
    Other(String),
}

/// A decoded webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Gateway-assigned event id; stable across redeliveries.
    pub id: String,
    pub created: DateTime<Utc>,
    pub payload: WebhookPayload,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    created: i64,
    #[serde(default)]
    data: serde_json::Value,
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        let raw: RawEvent = serde_json::from_slice(body)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
        if raw.id.is_empty() {
            return Err(WebhookError::InvalidPayload("event id is empty".to_string()));
        }
        let created = DateTime::from_timestamp(raw.created, 0)
            .ok_or_else(|| WebhookError::InvalidPayload("created is out of range".to_string()))?;

        let data = || {
            serde_json::from_value::<PaymentEventData>(raw.data.clone())
                .map_err(|e| WebhookError::InvalidPayload(e.to_string()))
        };
        let payload = match raw.kind.as_str() {
            "payment.succeeded" => WebhookPayload::PaymentSucceeded(data()?),
            "payment.failed" => WebhookPayload::PaymentFailed(data()?),
            "checkout.expired" => WebhookPayload::CheckoutExpired(data()?),
            _ => WebhookPayload::Other(raw.kind.clone()),
        };

        Ok(Self {
            id: raw.id,
            created,
            payload,
        })
    }

    pub fn event_type(&self) -> &str {
        match &self.payload {
            WebhookPayload::PaymentSucceeded(_) => "payment.succeeded",
            WebhookPayload::PaymentFailed(_) => "payment.failed",
            WebhookPayload::CheckoutExpired(_) => "checkout.expired",
            WebhookPayload::Other(kind) => kind,
        }
    }

    pub fn data(&self) -> Option<&PaymentEventData> {
        match &self.payload {
            WebhookPayload::PaymentSucceeded(data)
            | WebhookPayload::PaymentFailed(data)
            | WebhookPayload::CheckoutExpired(data) => Some(data),
            WebhookPayload::Other(_) => None,
        }
    }
}
