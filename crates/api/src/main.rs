//! API server entry point.

use std::sync::Arc;

use api::{AppState, Config, Gateway, LogFormat, StartupError, Store};
use common::SystemClock;
use event_store::{InMemoryEventStore, PostgresEventStore};
use fulfillment::{
    Availability, ExpiryWorker, HttpGatewayConfig, HttpPaymentGateway, InMemoryPaymentGateway,
};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn connect_store(config: &Config) -> Result<Store, StartupError> {
    let Some(url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, events are kept in memory");
        return Ok(Arc::new(InMemoryEventStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await?;
    let store = PostgresEventStore::new(pool);
    store.run_migrations().await?;
    tracing::info!("connected to PostgreSQL event store");
    Ok(Arc::new(store))
}

fn payment_gateway(config: &Config) -> Result<Gateway, StartupError> {
    let Some(settings) = &config.gateway else {
        tracing::warn!("PAYMENT_GATEWAY_URL not set, using the in-memory gateway");
        return Ok(Arc::new(InMemoryPaymentGateway::new()));
    };

    let gateway = HttpPaymentGateway::new(
        HttpGatewayConfig::new(&settings.base_url, &settings.secret_key)
            .with_redirects(&settings.success_url, &settings.cancel_url),
    )?;
    tracing::info!(base_url = %settings.base_url, "using hosted payment gateway");
    Ok(Arc::new(gateway))
}

async fn run(config: Config) -> Result<(), StartupError> {
    // 1. Prometheus recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| StartupError::Io(std::io::Error::other(e)))?;

    // 2. Store, gateway and services
    let store = connect_store(&config).await?;
    let gateway = payment_gateway(&config)?;
    let state = Arc::new(AppState::new(
        &config,
        store.clone(),
        gateway,
        Arc::new(SystemClock),
    )?);

    // 3. Replay existing events into the read models
    let replayed = state.availability.processor().run_catch_up().await?;
    tracing::info!(replayed, "projections caught up");

    // 4. Expiry worker
    let availability: Availability<Store> = state.availability.clone();
    let (worker, worker_shutdown) =
        ExpiryWorker::new(store, availability, state.clock.clone(), config.expiry_sweep);
    let worker = tokio::spawn(worker.run());

    // 5. Serve until a shutdown signal arrives
    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "starting API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = worker_shutdown.send(true);
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "expiry worker panicked");
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(2);
        }
    };
    init_tracing(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
