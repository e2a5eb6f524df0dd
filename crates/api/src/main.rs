//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::{AppState, Backends};
use saga::{HttpAppointmentClient, HttpBillingClient, HttpClientConfig, HttpInventoryClient};
use sqlx::postgres::PgPoolOptions;
use store::PostgresStore;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
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
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_backends(config: &Config) -> Backends {
    let mut backends = Backends::in_memory();
    backends.retry = config.retry_policy();

    if let Some(url) = &config.database_url {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .expect("failed to connect to PostgreSQL");
        let store = Arc::new(PostgresStore::new(pool));
        store
            .run_migrations()
            .await
            .expect("failed to run migrations");
        backends.schedules = store.clone();
        backends.exams = store.clone();
        backends.prescriptions = store;
        tracing::info!("using PostgreSQL store");
    } else {
        tracing::warn!("DATABASE_URL not set, using in-memory store");
    }

    let timeout = config.remote_timeout();
    if let Some(url) = &config.appointment_service_url {
        backends.appointments = Arc::new(
            HttpAppointmentClient::new(HttpClientConfig::new(url, timeout))
                .expect("failed to build appointment client"),
        );
    }
    if let Some(url) = &config.medicine_service_url {
        backends.inventory = Arc::new(
            HttpInventoryClient::new(HttpClientConfig::new(url, timeout))
                .expect("failed to build medicine client"),
        );
    }
    if let Some(url) = &config.billing_service_url {
        backends.billing = Arc::new(
            HttpBillingClient::new(HttpClientConfig::new(url, timeout))
                .expect("failed to build billing client"),
        );
    }

    backends
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire stores, remote clients and sagas
    let backends = build_backends(&config).await;
    let state = Arc::new(AppState::new(backends));

    // 4. Build the application
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
