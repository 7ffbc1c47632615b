//! HTTP API server for the ticket order system.
//!
//! Exposes the create-order and confirm-payment sagas plus the order
//! listing endpoints, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{OrderStore, ReconciliationLog};
use saga::{CatalogService, ReservationService};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<O, C, R, L>(
    state: Arc<AppState<O, C, R, L>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    O: OrderStore + 'static,
    C: CatalogService + 'static,
    R: ReservationService + 'static,
    L: ReconciliationLog + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<O, C, R, L>))
        .route("/orders", get(routes::orders::list::<O, C, R, L>))
        .route(
            "/orders/user/{userId}",
            get(routes::orders::list_by_user::<O, C, R, L>),
        )
        .route(
            "/orders/{id}/confirm",
            post(routes::orders::confirm::<O, C, R, L>),
        )
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

/// Application state wired entirely to in-memory collaborators, for tests
/// and for running without upstream services.
pub type InMemoryAppState = AppState<
    order_store::InMemoryOrderStore,
    saga::InMemoryCatalogService,
    saga::InMemoryReservationService,
    order_store::InMemoryReconciliationLog,
>;

/// Creates in-memory application state, returning handles to the
/// collaborators so callers can seed catalog events and inspect state.
pub fn create_default_state() -> (
    Arc<InMemoryAppState>,
    saga::InMemoryCatalogService,
    saga::InMemoryReservationService,
    order_store::InMemoryReconciliationLog,
) {
    use order_store::{InMemoryOrderStore, InMemoryReconciliationLog};
    use saga::{InMemoryCatalogService, InMemoryReservationService, OrderSagaCoordinator};

    let store = InMemoryOrderStore::new();
    let catalog = InMemoryCatalogService::new();
    let reservation = InMemoryReservationService::new();
    let log = InMemoryReconciliationLog::new();

    let coordinator = OrderSagaCoordinator::new(
        store.clone(),
        catalog.clone(),
        reservation.clone(),
        log.clone(),
    );

    let state = Arc::new(AppState {
        coordinator,
        store,
    });

    (state, catalog, reservation, log)
}
