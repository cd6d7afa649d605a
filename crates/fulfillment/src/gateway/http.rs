use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use serde::{Deserialize, Serialize};

use super::{CheckoutRequest, CheckoutSession, PaymentGateway, RefundReceipt};
use crate::error::GatewayError;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub secret_key: String,

    /// Where the gateway sends the buyer after paying.
    pub success_url: String,
    pub cancel_url: String,

    pub timeout: Duration,
}

impl HttpGatewayConfig {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            secret_key: secret_key.into(),
            success_url: String::new(),
            cancel_url: String::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_redirects(
        mut self,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        self.success_url = success_url.into();
        self.cancel_url = cancel_url.into();
        self
    }
}

/// JSON-over-HTTPS client for the hosted checkout gateway.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    config: HttpGatewayConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SessionBody<'a> {
    client_reference_id: String,
    amount_cents: i64,
    currency: &'a str,
    description: &'a str,
    customer_email: &'a str,
    expires_at: i64,
    success_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: String,
}

#[derive(Serialize)]
struct RefundBody<'a> {
    checkout_session: &'a str,
    amount_cents: i64,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
}

impl HttpPaymentGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.secret_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<R>().await?);
        }

        let body = response.bytes().await?;
        let message = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/error/message")
                    .or_else(|| value.get("message"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());

        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let body = SessionBody {
            client_reference_id: request.order_id.to_string(),
            amount_cents: request.amount.cents(),
            currency: request.currency.as_str(),
            description: &request.description,
            customer_email: &request.customer_email,
            expires_at: request.expires_at.timestamp(),
            success_url: &self.config.success_url,
            cancel_url: &self.config.cancel_url,
        };
        let session: SessionResponse = self.post("/v1/checkout/sessions", &body).await?;
        Ok(CheckoutSession {
            reference: session.id,
            redirect_url: session.url,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn refund(&self, reference: &str, amount: Money) -> Result<RefundReceipt, GatewayError> {
        let body = RefundBody {
            checkout_session: reference,
            amount_cents: amount.cents(),
        };
        let refund: RefundResponse = self.post("/v1/refunds", &body).await?;
        Ok(RefundReceipt {
            refund_id: refund.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use chrono::Utc;
    use common::AggregateId;
    use domain::Currency;
    use serde_json::{Value, json};

    async fn spawn_gateway(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn gateway(base_url: String) -> HttpPaymentGateway {
        HttpPaymentGateway::new(
            HttpGatewayConfig::new(base_url, "sk_test_123")
                .with_redirects("https://conf.example/paid", "https://conf.example/cancelled"),
        )
        .unwrap()
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            order_id: AggregateId::new(),
            amount: Money::from_cents(19900),
            currency: Currency::default(),
            description: "1 x General Admission".to_string(),
            customer_email: "ada@example.com".to_string(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_checkout_sends_bearer_and_body() {
        let app = Router::new().route(
            "/v1/checkout/sessions",
            post(|headers: HeaderMap, axum::Json(body): axum::Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if auth != "Bearer sk_test_123"
                    || body["amount_cents"] != 19900
                    || body["success_url"] != "https://conf.example/paid"
                {
                    return (StatusCode::BAD_REQUEST, axum::Json(json!({"message": "bad"})));
                }
                (
                    StatusCode::OK,
                    axum::Json(json!({"id": "cs_live_1", "url": "https://pay.example/cs_live_1"})),
                )
            }),
        );
        let gateway = gateway(spawn_gateway(app).await);

        let session = gateway.create_checkout(request()).await.unwrap();
        assert_eq!(session.reference, "cs_live_1");
        assert_eq!(session.redirect_url, "https://pay.example/cs_live_1");
    }

    #[tokio::test]
    async fn non_success_status_is_rejected_with_message() {
        let app = Router::new().route(
            "/v1/refunds",
            post(|| async {
                (
                    StatusCode::PAYMENT_REQUIRED,
                    axum::Json(json!({"error": {"message": "already refunded"}})),
                )
            }),
        );
        let gateway = gateway(spawn_gateway(app).await);

        let err = gateway
            .refund("cs_live_1", Money::from_cents(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Rejected { status: 402, ref message } if message == "already refunded"
        ));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = gateway(format!("http://{addr}"))
            .create_checkout(request())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
