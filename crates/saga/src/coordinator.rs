//! Saga coordinator for order creation and payment confirmation.

use common::{EventId, OrderId, UserId};
use order_store::{
    NewOrder, Order, OrderStatus, OrderStore, ReconciliationKind, ReconciliationLog,
    ReconciliationRecord,
};

use crate::error::SagaError;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::services::catalog::CatalogService;
use crate::services::reservation::ReservationService;
use crate::state::{ConfirmPhase, PurchasePhase};

/// Input to [`OrderSagaCoordinator::create_order`].
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub event_id: EventId,
    pub quantity: u32,
}

/// Outcome of a successful [`OrderSagaCoordinator::confirm_payment`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Lock confirmed and stock committed.
    Settled,

    /// The order was already SUCCESS; nothing was done.
    AlreadySettled,

    /// The order is SUCCESS locally but at least one downstream commit
    /// failed; a reconciliation task was recorded.
    SettledPendingReconciliation,
}

/// Orchestrates the two purchase workflows across the catalog, the
/// reservation service and the order ledger.
///
/// create-order runs price → reserve → persist; a persist failure triggers
/// the compensating reservation release. confirm-payment flips the order to
/// SUCCESS locally before any downstream call, so a crash afterwards can
/// never lose the payment fact; the downstream sync is retried and, on
/// terminal failure, recorded for reconciliation.
///
/// All collaborators are injected at construction; the coordinator holds no
/// global state and requests run independently.
pub struct OrderSagaCoordinator<O, C, R, L>
where
    O: OrderStore,
    C: CatalogService,
    R: ReservationService,
    L: ReconciliationLog,
{
    store: O,
    catalog: C,
    reservation: R,
    reconciliation: L,
    retry: RetryPolicy,
}

impl<O, C, R, L> OrderSagaCoordinator<O, C, R, L>
where
    O: OrderStore,
    C: CatalogService,
    R: ReservationService,
    L: ReconciliationLog,
{
    /// Creates a new coordinator with the default retry policy.
    pub fn new(store: O, catalog: C, reservation: R, reconciliation: L) -> Self {
        Self {
            store,
            catalog,
            reservation,
            reconciliation,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy used for downstream commit calls.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Creates an order: quote the price, lock stock, persist PENDING.
    ///
    /// Failures before the reservation leave no side effects. A store
    /// failure after the reservation triggers the compensating release; if
    /// the release itself fails the orphaned lock is durably recorded.
    #[tracing::instrument(
        skip(self, request),
        fields(event_id = %request.event_id, user_id = %request.user_id, quantity = request.quantity)
    )]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, SagaError> {
        metrics::counter!("order_create_total").increment(1);
        let start = std::time::Instant::now();
        let mut phase = PurchasePhase::Started;

        if request.quantity == 0 {
            metrics::counter!("order_create_failures_total").increment(1);
            return Err(SagaError::InvalidInput {
                reason: "quantity must be positive".to_string(),
            });
        }
        if request.user_id.is_empty() {
            metrics::counter!("order_create_failures_total").increment(1);
            return Err(SagaError::InvalidInput {
                reason: "userId must not be empty".to_string(),
            });
        }

        // Step 1: price lookup. Nothing to compensate on failure.
        let quote = self.catalog.get_price(request.event_id).await.map_err(|e| {
            metrics::counter!("order_create_failures_total").increment(1);
            e
        })?;
        let total = quote
            .unit_price
            .checked_multiply(request.quantity)
            .ok_or_else(|| {
                metrics::counter!("order_create_failures_total").increment(1);
                SagaError::InvalidInput {
                    reason: "order total out of range".to_string(),
                }
            })?;
        advance_purchase(&mut phase, PurchasePhase::Priced);

        // Step 2: reservation lock. Still nothing to compensate on failure.
        self.reservation
            .reserve(request.event_id, &request.user_id, request.quantity)
            .await
            .map_err(|e| {
                metrics::counter!("order_create_failures_total").increment(1);
                e
            })?;
        advance_purchase(&mut phase, PurchasePhase::Reserved);

        // Step 3: persist PENDING. From here a failure leaves a held lock,
        // so the compensating release must run before the error surfaces.
        let new_order = NewOrder {
            user_id: request.user_id.clone(),
            event_id: request.event_id,
            quantity: request.quantity,
            total,
        };
        match self.store.insert(new_order).await {
            Ok(order) => {
                advance_purchase(&mut phase, PurchasePhase::Persisted);
                metrics::histogram!("order_create_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(order_id = %order.id, total = %order.total, "order created");
                Ok(order)
            }
            Err(store_err) => {
                metrics::counter!("order_create_failures_total").increment(1);
                tracing::warn!(
                    error = %store_err,
                    "order insert failed after reservation, releasing lock"
                );

                if let Err(release_err) = self
                    .reservation
                    .release(request.event_id, &request.user_id)
                    .await
                {
                    self.record_reconciliation(ReconciliationRecord::new(
                        None,
                        request.event_id,
                        request.user_id.clone(),
                        ReconciliationKind::OrphanedLock,
                        format!(
                            "insert failed ({store_err}) and release failed ({release_err})"
                        ),
                    ))
                    .await;
                }

                advance_purchase(&mut phase, PurchasePhase::Aborted);
                Err(store_err.into())
            }
        }
    }

    /// Confirms payment for a PENDING order.
    ///
    /// A second call on an already-SUCCESS order is an idempotent no-op.
    /// The local SUCCESS flip is persisted before the reservation confirm
    /// and the catalog stock commit; if either of those fails after retries,
    /// the order is flagged and recorded for reconciliation instead of
    /// failing the caller.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn confirm_payment(&self, order_id: OrderId) -> Result<ConfirmOutcome, SagaError> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;

        match order.status {
            OrderStatus::Success => {
                tracing::info!("order already settled, confirm is a no-op");
                return Ok(ConfirmOutcome::AlreadySettled);
            }
            OrderStatus::Failed => {
                return Err(SagaError::InvalidState {
                    expected: OrderStatus::Pending,
                    actual: order.status,
                });
            }
            OrderStatus::Pending => {}
        }

        let mut phase = ConfirmPhase::Pending;

        // The payment fact must be durable before any downstream call; a
        // crash from here on leaves retryable housekeeping, not a lost
        // payment. An update failure keeps the order PENDING and retryable.
        let mut updated = order.clone();
        updated.status = OrderStatus::Success;
        let mut updated = self.store.update(&updated).await?;
        advance_confirm(&mut phase, ConfirmPhase::Confirming);
        metrics::counter!("payments_confirmed_total").increment(1);

        let mut failures: Vec<(ReconciliationKind, String)> = Vec::new();

        if let Err(e) = retry_with_backoff(&self.retry, || {
            self.reservation
                .confirm(order.event_id, &order.user_id, order.quantity)
        })
        .await
        {
            tracing::warn!(error = %e, "reservation confirm failed after retries");
            failures.push((ReconciliationKind::LockConfirmFailed, e.to_string()));
        }

        if let Err(e) = retry_with_backoff(&self.retry, || {
            self.catalog
                .commit_stock_reduction(order.event_id, order.quantity, order.id)
        })
        .await
        {
            tracing::warn!(error = %e, "catalog stock commit failed after retries");
            failures.push((ReconciliationKind::StockCommitFailed, e.to_string()));
        }

        if failures.is_empty() {
            advance_confirm(&mut phase, ConfirmPhase::Settled);
            tracing::info!("payment confirmed, downstream state in sync");
            return Ok(ConfirmOutcome::Settled);
        }

        advance_confirm(&mut phase, ConfirmPhase::ConfirmFailed);

        // The reconciliation records below are the durable trail; the flag
        // on the order row is a convenience for listing queries.
        updated.needs_reconciliation = true;
        if let Err(e) = self.store.update(&updated).await {
            tracing::error!(error = %e, "failed to persist needs_reconciliation flag");
        }

        for (kind, detail) in failures {
            self.record_reconciliation(ReconciliationRecord::new(
                Some(order.id),
                order.event_id,
                order.user_id.clone(),
                kind,
                detail,
            ))
            .await;
        }

        Ok(ConfirmOutcome::SettledPendingReconciliation)
    }

    /// Writes a reconciliation record, falling back to an error log if the
    /// log itself is down. This is the last line of defense; it must not
    /// turn into a caller-visible error.
    async fn record_reconciliation(&self, record: ReconciliationRecord) {
        metrics::counter!("reconciliation_records_total").increment(1);
        tracing::error!(
            kind = %record.kind,
            event_id = %record.event_id,
            user_id = %record.user_id,
            detail = %record.detail,
            "recording reconciliation task"
        );
        if let Err(e) = self.reconciliation.record(record).await {
            tracing::error!(error = %e, "reconciliation log write failed");
        }
    }
}

fn advance_purchase(phase: &mut PurchasePhase, next: PurchasePhase) {
    debug_assert!(phase.can_advance_to(next));
    tracing::debug!(from = %phase, to = %next, "purchase phase transition");
    *phase = next;
}

fn advance_confirm(phase: &mut ConfirmPhase, next: ConfirmPhase) {
    debug_assert!(phase.can_advance_to(next));
    tracing::debug!(from = %phase, to = %next, "confirm phase transition");
    *phase = next;
}

#[cfg(test)]
mod tests {
    use common::Money;
    use order_store::{InMemoryOrderStore, InMemoryReconciliationLog, StoreError};

    use super::*;
    use crate::services::catalog::InMemoryCatalogService;
    use crate::services::reservation::InMemoryReservationService;

    type TestCoordinator = OrderSagaCoordinator<
        InMemoryOrderStore,
        InMemoryCatalogService,
        InMemoryReservationService,
        InMemoryReconciliationLog,
    >;

    fn setup() -> (
        TestCoordinator,
        InMemoryOrderStore,
        InMemoryCatalogService,
        InMemoryReservationService,
        InMemoryReconciliationLog,
    ) {
        let store = InMemoryOrderStore::new();
        let catalog = InMemoryCatalogService::new();
        let reservation = InMemoryReservationService::new();
        let log = InMemoryReconciliationLog::new();

        // Event 7: price 50.00, stock 3 in both the catalog and the
        // reservation counter.
        catalog.add_event(EventId::new(7), Money::from_major_units(50.0), 3);
        reservation.set_stock(EventId::new(7), 3);

        let coordinator = OrderSagaCoordinator::new(
            store.clone(),
            catalog.clone(),
            reservation.clone(),
            log.clone(),
        )
        .with_retry_policy(RetryPolicy::no_retries());

        (coordinator, store, catalog, reservation, log)
    }

    fn request(user: &str, event: i64, quantity: u32) -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: UserId::new(user),
            event_id: EventId::new(event),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_create_order_happy_path() {
        let (coordinator, store, catalog, reservation, _) = setup();

        let order = coordinator.create_order(request("u1", 7, 2)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Money::from_cents(10_000));
        assert!(!order.needs_reconciliation);

        // Lock held, ephemeral stock decremented, permanent stock untouched.
        assert!(reservation.has_lock(EventId::new(7), &UserId::new("u1")));
        assert_eq!(reservation.stock_of(EventId::new(7)), Some(1));
        assert_eq!(catalog.stock_of(EventId::new(7)), Some(3));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_then_confirm_settles_order() {
        let (coordinator, store, catalog, reservation, log) = setup();

        let order = coordinator.create_order(request("u1", 7, 2)).await.unwrap();
        let outcome = coordinator.confirm_payment(order.id).await.unwrap();
        assert_eq!(outcome, ConfirmOutcome::Settled);

        let settled = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(settled.status, OrderStatus::Success);
        assert!(!settled.needs_reconciliation);
        assert_eq!(settled.total.as_major_units(), 100.0);

        // Lock released, permanent stock reduced to 1.
        assert_eq!(reservation.lock_count(), 0);
        assert_eq!(catalog.stock_of(EventId::new(7)), Some(1));
        assert_eq!(log.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected_before_any_call() {
        let (coordinator, store, _, reservation, _) = setup();

        let result = coordinator.create_order(request("u1", 7, 0)).await;
        assert!(matches!(result, Err(SagaError::InvalidInput { .. })));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(reservation.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_user_rejected() {
        let (coordinator, _, _, _, _) = setup();

        let result = coordinator.create_order(request("", 7, 1)).await;
        assert!(matches!(result, Err(SagaError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_overflowing_total_rejected_before_reservation() {
        let (coordinator, store, catalog, reservation, _) = setup();
        catalog.add_event(EventId::new(11), Money::from_cents(i64::MAX), 10);
        reservation.set_stock(EventId::new(11), 10);

        let result = coordinator.create_order(request("u1", 11, 2)).await;
        assert!(matches!(result, Err(SagaError::InvalidInput { .. })));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(reservation.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_event_aborts_without_side_effects() {
        let (coordinator, store, _, reservation, _) = setup();

        let result = coordinator.create_order(request("u1", 99, 1)).await;
        assert!(matches!(result, Err(SagaError::EventNotFound(_))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(reservation.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_persists_nothing() {
        let (coordinator, store, _, _, _) = setup();

        let result = coordinator.create_order(request("u1", 7, 5)).await;
        assert!(matches!(result, Err(SagaError::Conflict { .. })));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_lock_rejected() {
        let (coordinator, store, _, _, _) = setup();

        coordinator.create_order(request("u1", 7, 1)).await.unwrap();
        let result = coordinator.create_order(request("u1", 7, 1)).await;

        assert!(matches!(result, Err(SagaError::Conflict { .. })));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_insert_failure_releases_reservation() {
        let (coordinator, store, _, reservation, log) = setup();

        store.set_unavailable(true).await;
        let result = coordinator.create_order(request("u1", 7, 2)).await;

        assert!(matches!(
            result,
            Err(SagaError::Store(StoreError::Unavailable(_)))
        ));
        // Compensation freed the lock and returned the stock.
        assert_eq!(reservation.lock_count(), 0);
        assert_eq!(reservation.stock_of(EventId::new(7)), Some(3));
        assert_eq!(log.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_release_records_orphaned_lock() {
        let (coordinator, store, _, reservation, log) = setup();

        store.set_unavailable(true).await;
        reservation.set_fail_on_release(true);

        let result = coordinator.create_order(request("u1", 7, 2)).await;
        assert!(result.is_err());

        // The lock is stranded but not silently: a durable record exists.
        let records = log.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ReconciliationKind::OrphanedLock);
        assert_eq!(records[0].order_id, None);
        assert_eq!(records[0].event_id, EventId::new(7));
        assert_eq!(records[0].user_id, UserId::new("u1"));
    }

    #[tokio::test]
    async fn test_confirm_unknown_order() {
        let (coordinator, _, _, _, _) = setup();

        let result = coordinator.confirm_payment(OrderId::new()).await;
        assert!(matches!(result, Err(SagaError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let (coordinator, _, catalog, _, _) = setup();

        let order = coordinator.create_order(request("u1", 7, 2)).await.unwrap();
        coordinator.confirm_payment(order.id).await.unwrap();
        let commit_calls_after_first = catalog.commit_calls();

        let outcome = coordinator.confirm_payment(order.id).await.unwrap();
        assert_eq!(outcome, ConfirmOutcome::AlreadySettled);

        // No additional downstream side effects.
        assert_eq!(catalog.commit_calls(), commit_calls_after_first);
        assert_eq!(catalog.stock_of(EventId::new(7)), Some(1));
    }

    #[tokio::test]
    async fn test_confirm_failed_order_is_invalid_state() {
        let (coordinator, store, _, _, _) = setup();

        let order = coordinator.create_order(request("u1", 7, 2)).await.unwrap();
        let mut failed = order.clone();
        failed.status = OrderStatus::Failed;
        store.update(&failed).await.unwrap();

        let result = coordinator.confirm_payment(order.id).await;
        assert!(matches!(result, Err(SagaError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_stock_commit_failure_flags_reconciliation() {
        let (coordinator, store, catalog, reservation, log) = setup();

        let order = coordinator.create_order(request("u1", 7, 2)).await.unwrap();
        catalog.set_fail_on_commit(true);

        let outcome = coordinator.confirm_payment(order.id).await.unwrap();
        assert_eq!(outcome, ConfirmOutcome::SettledPendingReconciliation);

        // Payment fact is durable, lock was still confirmed.
        let settled = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(settled.status, OrderStatus::Success);
        assert!(settled.needs_reconciliation);
        assert_eq!(reservation.lock_count(), 0);

        let records = log.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ReconciliationKind::StockCommitFailed);
        assert_eq!(records[0].order_id, Some(order.id));
    }

    #[tokio::test]
    async fn test_lock_confirm_failure_still_commits_stock() {
        let (coordinator, store, catalog, reservation, log) = setup();

        let order = coordinator.create_order(request("u1", 7, 2)).await.unwrap();
        reservation.set_fail_on_confirm(true);

        let outcome = coordinator.confirm_payment(order.id).await.unwrap();
        assert_eq!(outcome, ConfirmOutcome::SettledPendingReconciliation);

        // The independent stock commit still ran.
        assert_eq!(catalog.stock_of(EventId::new(7)), Some(1));
        let settled = store.get(order.id).await.unwrap().unwrap();
        assert!(settled.needs_reconciliation);

        let records = log.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ReconciliationKind::LockConfirmFailed);
    }

    #[tokio::test]
    async fn test_concurrent_create_for_last_unit_has_one_winner() {
        let (coordinator, store, catalog, reservation, _) = setup();
        catalog.add_event(EventId::new(9), Money::from_major_units(80.0), 1);
        reservation.set_stock(EventId::new(9), 1);

        let (a, b) = tokio::join!(
            coordinator.create_order(request("u1", 9, 1)),
            coordinator.create_order(request("u2", 9, 1)),
        );

        let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);

        let loser = if a.is_err() { a } else { b };
        assert!(matches!(loser, Err(SagaError::Conflict { .. })));
        assert_eq!(store.order_count().await, 1);
        assert_eq!(reservation.stock_of(EventId::new(9)), Some(0));
    }
}
