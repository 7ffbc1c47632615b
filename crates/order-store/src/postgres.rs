use async_trait::async_trait;
use chrono::Utc;
use common::{EventId, Money, OrderId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    NewOrder, Order, OrderStatus, ReconciliationLog, ReconciliationRecord, Result, StoreError,
    store::OrderStore,
};

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status_str: String = row.try_get("status").map_err(map_db_err)?;
        let status = OrderStatus::parse(&status_str).ok_or_else(|| {
            StoreError::Database(sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: format!("unknown order status '{status_str}'").into(),
            })
        })?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id").map_err(map_db_err)?),
            user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(map_db_err)?),
            event_id: EventId::new(row.try_get::<i64, _>("event_id").map_err(map_db_err)?),
            quantity: row.try_get::<i32, _>("quantity").map_err(map_db_err)? as u32,
            total: Money::from_cents(row.try_get::<i64, _>("total_cents").map_err(map_db_err)?),
            status,
            needs_reconciliation: row
                .try_get::<bool, _>("needs_reconciliation")
                .map_err(map_db_err)?,
            created_at: row.try_get("created_at").map_err(map_db_err)?,
            updated_at: row.try_get("updated_at").map_err(map_db_err)?,
        })
    }
}

/// Connectivity loss surfaces as `Unavailable`; everything else stays a
/// database error.
fn map_db_err(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order> {
        let now = Utc::now();
        let persisted = Order {
            id: OrderId::new(),
            user_id: order.user_id,
            event_id: order.event_id,
            quantity: order.quantity,
            total: order.total,
            status: OrderStatus::Pending,
            needs_reconciliation: false,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, event_id, quantity, total_cents, status, needs_reconciliation, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(persisted.id.as_uuid())
        .bind(persisted.user_id.as_str())
        .bind(persisted.event_id.as_i64())
        .bind(persisted.quantity as i32)
        .bind(persisted.total.cents())
        .bind(persisted.status.as_str())
        .bind(persisted.needs_reconciliation)
        .bind(persisted.created_at)
        .bind(persisted.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(persisted)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(Self::row_to_order).transpose()
    }

    async fn update(&self, order: &Order) -> Result<Order> {
        let mut updated = order.clone();
        updated.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, needs_reconciliation = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(updated.id.as_uuid())
        .bind(updated.status.as_str())
        .bind(updated.needs_reconciliation)
        .bind(updated.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(order.id));
        }

        Ok(updated)
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders ORDER BY created_at ASC, id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}

/// PostgreSQL-backed reconciliation log.
///
/// Records land in the `reconciliation_tasks` table where an out-of-band
/// process (or an operator) resolves them.
#[derive(Clone)]
pub struct PostgresReconciliationLog {
    pool: PgPool,
}

impl PostgresReconciliationLog {
    /// Creates a new PostgreSQL reconciliation log.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReconciliationLog for PostgresReconciliationLog {
    async fn record(&self, record: ReconciliationRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_tasks (id, order_id, event_id, user_id, kind, detail, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.order_id.map(|id| id.as_uuid()))
        .bind(record.event_id.as_i64())
        .bind(record.user_id.as_str())
        .bind(record.kind.as_str())
        .bind(&record.detail)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(())
    }
}
