//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::routes::orders::AppState;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{
    InMemoryOrderStore, InMemoryReconciliationLog, OrderStore, PostgresOrderStore,
    PostgresReconciliationLog, ReconciliationLog,
};
use saga::{HttpCatalogClient, HttpReservationClient, OrderSagaCoordinator, RetryPolicy};
use sqlx::postgres::PgPoolOptions;
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

/// Builds the coordinator against the HTTP collaborators and serves.
async fn serve<O, L>(config: Config, store: O, reconciliation: L, metrics_handle: PrometheusHandle)
where
    O: OrderStore + Clone + 'static,
    L: ReconciliationLog + 'static,
{
    let client = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .expect("failed to build HTTP client");

    let catalog = HttpCatalogClient::new(client.clone(), config.catalog_url.clone());
    let reservation = HttpReservationClient::new(
        client,
        config.reservation_url.clone(),
        config.reservation_path_order,
    );

    let retry = RetryPolicy {
        max_retries: config.downstream_max_retries,
        ..RetryPolicy::default()
    };
    let coordinator = OrderSagaCoordinator::new(store.clone(), catalog, reservation, reconciliation)
        .with_retry_policy(retry);

    let state = Arc::new(AppState { coordinator, store });
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, catalog = %config.catalog_url, reservation = %config.reservation_url, "starting order API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let config = Config::from_env();

    // 3. Pick the ledger: Postgres when DATABASE_URL is set, in-memory
    // otherwise (reconciliation records are then not durable across
    // restarts; fine for local development only).
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to Postgres");

            let store = PostgresOrderStore::new(pool.clone());
            store.run_migrations().await.expect("migrations failed");

            serve(
                config,
                store,
                PostgresReconciliationLog::new(pool),
                metrics_handle,
            )
            .await;
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, using in-memory order store");
            serve(
                config,
                InMemoryOrderStore::new(),
                InMemoryReconciliationLog::new(),
                metrics_handle,
            )
            .await;
        }
    }
}
