use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::response::query_result::QueryResult;
use scylla::value::{CqlValue, Row};

use super::{OrderRepository, StoreError};
use crate::domain::order::{Order, OrderStatus, PaymentMethod};

// ============================================================================
// ScyllaDB Order Repository
// ============================================================================
//
// Conditional writes use lightweight transactions:
// - create:  INSERT ... IF NOT EXISTS
// - update:  UPDATE ... IF status = ?
//
// A non-applied update is classified by re-reading the stored status.
//
// ============================================================================

type OrderRow = (
    String,
    String,
    Option<Vec<String>>,
    f64,
    String,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

const SELECT_ORDER: &str = "SELECT order_id, user_id, part_ids, total_price, status, \
     payment_method, transaction_id, created_at, updated_at FROM orders WHERE order_id = ?";

pub struct ScyllaOrderRepository {
    session: Arc<Session>,
}

impl ScyllaOrderRepository {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Connect, create the keyspace and table if missing, and switch to the keyspace.
    pub async fn connect(nodes: &[String], keyspace: &str) -> Result<Self, StoreError> {
        tracing::info!(nodes = ?nodes, keyspace, "Connecting to ScyllaDB...");

        let session: Session = SessionBuilder::new()
            .known_nodes(nodes)
            .build()
            .await
            .map_err(StoreError::backend)?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    keyspace
                ),
                &[],
            )
            .await
            .map_err(StoreError::backend)?;

        session
            .use_keyspace(keyspace, false)
            .await
            .map_err(StoreError::backend)?;

        let repo = Self::new(Arc::new(session));
        repo.ensure_schema().await?;
        Ok(repo)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS orders (
                    order_id text PRIMARY KEY,
                    user_id text,
                    part_ids list<text>,
                    total_price double,
                    status text,
                    payment_method text,
                    transaction_id text,
                    created_at timestamp,
                    updated_at timestamp
                )",
                &[],
            )
            .await
            .map_err(StoreError::backend)?;

        tracing::info!("✅ Order schema ready");
        Ok(())
    }

    async fn current_status(&self, order_id: &str) -> Result<OrderStatus, StoreError> {
        let result = self
            .session
            .query_unpaged("SELECT status FROM orders WHERE order_id = ?", (order_id,))
            .await
            .map_err(StoreError::backend)?;

        let rows = result.into_rows_result().map_err(StoreError::backend)?;
        match rows.maybe_first_row::<(String,)>().map_err(StoreError::backend)? {
            Some((status,)) => status.parse().map_err(StoreError::backend),
            None => Err(StoreError::NotFound(order_id.to_string())),
        }
    }
}

#[async_trait]
impl OrderRepository for ScyllaOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), StoreError> {
        let result = self
            .session
            .query_unpaged(
                "INSERT INTO orders (
                    order_id, user_id, part_ids, total_price, status,
                    payment_method, transaction_id, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS",
                (
                    order.order_id.as_str(),
                    order.user_id.as_str(),
                    &order.part_ids,
                    order.total_price,
                    order.status.as_str(),
                    order.payment_method.map(|m| m.as_str()),
                    order.transaction_id.as_deref(),
                    order.created_at,
                    order.updated_at,
                ),
            )
            .await
            .map_err(StoreError::backend)?;

        if !was_applied(result)? {
            return Err(StoreError::AlreadyExists(order.order_id.clone()));
        }

        tracing::debug!(order_id = %order.order_id, "Inserted order row");
        Ok(())
    }

    async fn get(&self, order_id: &str) -> Result<Order, StoreError> {
        let result = self
            .session
            .query_unpaged(SELECT_ORDER, (order_id,))
            .await
            .map_err(StoreError::backend)?;

        let rows = result.into_rows_result().map_err(StoreError::backend)?;
        match rows.maybe_first_row::<OrderRow>().map_err(StoreError::backend)? {
            Some(row) => order_from_row(row),
            None => Err(StoreError::NotFound(order_id.to_string())),
        }
    }

    async fn update(&self, order: &Order, expected: OrderStatus) -> Result<(), StoreError> {
        let result = self
            .session
            .query_unpaged(
                "UPDATE orders SET status = ?, payment_method = ?, transaction_id = ?, updated_at = ? \
                 WHERE order_id = ? IF status = ?",
                (
                    order.status.as_str(),
                    order.payment_method.map(|m| m.as_str()),
                    order.transaction_id.as_deref(),
                    order.updated_at,
                    order.order_id.as_str(),
                    expected.as_str(),
                ),
            )
            .await
            .map_err(StoreError::backend)?;

        if was_applied(result)? {
            return Ok(());
        }

        let actual = self.current_status(&order.order_id).await?;
        tracing::debug!(
            order_id = %order.order_id,
            expected = %expected,
            actual = %actual,
            "Conditional update not applied"
        );
        Err(StoreError::conflict(&order.order_id, expected, actual))
    }
}

/// Reads the `[applied]` column every lightweight transaction returns first.
fn was_applied(result: QueryResult) -> Result<bool, StoreError> {
    let rows = result.into_rows_result().map_err(StoreError::backend)?;
    let row = rows.maybe_first_row::<Row>().map_err(StoreError::backend)?;

    match row.and_then(|r| r.columns.into_iter().next().flatten()) {
        Some(CqlValue::Boolean(applied)) => Ok(applied),
        other => Err(StoreError::Backend(format!(
            "unexpected lightweight transaction result: {:?}",
            other
        ))),
    }
}

fn order_from_row(row: OrderRow) -> Result<Order, StoreError> {
    let (
        order_id,
        user_id,
        part_ids,
        total_price,
        status,
        payment_method,
        transaction_id,
        created_at,
        updated_at,
    ) = row;

    let payment_method = payment_method
        .map(|m| m.parse::<PaymentMethod>())
        .transpose()
        .map_err(StoreError::backend)?;

    Ok(Order {
        order_id,
        user_id,
        part_ids: part_ids.unwrap_or_default(),
        total_price,
        status: status.parse().map_err(StoreError::backend)?,
        payment_method,
        transaction_id,
        created_at,
        updated_at,
    })
}
