//! Payment gateway webhook receiver.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use fulfillment::{FulfillmentOutcome, SIGNATURE_HEADER, WebhookError};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /webhooks/payments
///
/// Every delivery that authenticates is answered 200 with the outcome, so the
/// gateway stops retrying. Failures the gateway should retry (an unreachable
/// refund endpoint, a storage error) return 5xx.
#[tracing::instrument(skip(state, headers, body), fields(bytes = body.len()))]
pub async fn payments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FulfillmentOutcome>, ApiError> {
    metrics::counter!("webhooks_received_total").increment(1);
    let now = state.clock.now();

    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookError::MalformedHeader);
    let event = match header.and_then(|header| state.verifier.verify_event(header, &body, now)) {
        Ok(event) => event,
        Err(e) => {
            metrics::counter!("webhooks_rejected_total", "reason" => rejection_reason(&e))
                .increment(1);
            tracing::warn!(error = %e, "webhook rejected");
            return Err(e.into());
        }
    };

    let outcome = state.fulfillment.handle_event(&event, now).await?;
    Ok(Json(outcome))
}

fn rejection_reason(e: &WebhookError) -> &'static str {
    match e {
        WebhookError::EmptySecret => "misconfigured",
        WebhookError::MalformedHeader => "malformed_header",
        WebhookError::StaleTimestamp { .. } => "stale_timestamp",
        WebhookError::SignatureMismatch => "signature_mismatch",
        WebhookError::InvalidPayload(_) => "invalid_payload",
    }
}
