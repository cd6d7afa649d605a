//! HTTP API for conference ticketing.
//!
//! Exposes checkout, order lookup, the payment webhook, participant badges,
//! door check-in and sales stats, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, ConfigError, GatewaySettings, LogFormat};
pub use error::{ApiError, StartupError};
pub use state::{AppState, Gateway, Store};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::health::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/ticket-types", get(routes::ticket_types::list))
        .route("/orders", post(routes::orders::create))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/tickets", get(routes::orders::tickets))
        .route("/webhooks/payments", post(routes::webhooks::payments))
        .route("/participants", post(routes::participants::register))
        .route("/participants/{id}", get(routes::participants::get))
        .route(
            "/check-in/{code}",
            get(routes::check_in::lookup).post(routes::check_in::check_in),
        )
        .route("/stats", get(routes::stats::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
