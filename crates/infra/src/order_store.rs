//! Order storage.
//!
//! Status and payment transitions are compare-and-swap updates keyed on the
//! expected current value, so replayed webhooks and concurrent admin actions
//! degrade to no-ops instead of double-applying.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use shopforge_core::{OrderId, Owner, ProductId, SessionToken, UserId, VariantId};
use shopforge_orders::{Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, ShippingInfo};

use crate::error::StoreError;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<(), StoreError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// CAS on `payment_status`. `Ok(true)` if applied; `Ok(false)` when the
    /// current value differs from `expected` (replay / lost race).
    async fn transition_payment(
        &self,
        id: OrderId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<bool, StoreError>;

    /// CAS on `status`, same semantics as [`transition_payment`].
    ///
    /// [`transition_payment`]: OrderStore::transition_payment
    async fn transition_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool, StoreError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory implementation (dev/test)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<OrderId, Order>>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("order lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<OrderId, Order>>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("order lock poisoned".to_string()))
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<(), StoreError> {
        let mut orders = self.write()?;
        if orders.contains_key(&order.id) {
            return Err(StoreError::Conflict("order already exists".to_string()));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn transition_payment(
        &self,
        id: OrderId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<bool, StoreError> {
        let mut orders = self.write()?;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound)?;
        if order.payment_status != expected {
            return Ok(false);
        }
        order.payment_status = next;
        Ok(true)
    }

    async fn transition_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool, StoreError> {
        let mut orders = self.write()?;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound)?;
        if order.status != expected {
            return Ok(false);
        }
        order.status = next;
        Ok(true)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Postgres implementation
// ─────────────────────────────────────────────────────────────────────────────

pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn method_to_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Card => "card",
        PaymentMethod::CashOnDelivery => "cash_on_delivery",
    }
}

fn method_from_str(s: &str) -> Result<PaymentMethod, StoreError> {
    match s {
        "card" => Ok(PaymentMethod::Card),
        "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
        other => Err(StoreError::Backend(format!("unknown payment method: {other}"))),
    }
}

fn status_from_str(s: &str) -> Result<OrderStatus, StoreError> {
    match s {
        "pending" => Ok(OrderStatus::Pending),
        "preparing" => Ok(OrderStatus::Preparing),
        "shipping" => Ok(OrderStatus::Shipping),
        "delivered" => Ok(OrderStatus::Delivered),
        "cancelled" => Ok(OrderStatus::Cancelled),
        "refunded" => Ok(OrderStatus::Refunded),
        other => Err(StoreError::Backend(format!("unknown order status: {other}"))),
    }
}

fn payment_from_str(s: &str) -> Result<PaymentStatus, StoreError> {
    match s {
        "pending" => Ok(PaymentStatus::Pending),
        "paid" => Ok(PaymentStatus::Paid),
        "failed" => Ok(PaymentStatus::Failed),
        other => Err(StoreError::Backend(format!("unknown payment status: {other}"))),
    }
}

fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order, StoreError> {
    let user_id: Option<Uuid> = row.try_get("user_id")?;
    let session_id: Option<String> = row.try_get("session_id")?;
    let owner = match (user_id, session_id) {
        (Some(id), None) => Owner::User(UserId::from_uuid(id)),
        (None, Some(token)) => Owner::Guest(
            SessionToken::new(token)
                .map_err(|e| StoreError::Backend(format!("corrupt session token: {e}")))?,
        ),
        _ => {
            return Err(StoreError::Backend(
                "order must have exactly one owner".to_string(),
            ));
        }
    };
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;
    let payment_method: String = row.try_get("payment_method")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        owner,
        shipping: ShippingInfo {
            recipient: row.try_get("recipient")?,
            address_line: row.try_get("address_line")?,
            city: row.try_get("city")?,
            postal_code: row.try_get("postal_code")?,
            country: row.try_get("country")?,
        },
        payment_method: method_from_str(&payment_method)?,
        lines,
        status: status_from_str(&status)?,
        payment_status: payment_from_str(&payment_status)?,
        payment_intent_id: row.try_get("payment_intent_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order_line(row: &PgRow) -> Result<OrderLine, StoreError> {
    let quantity: i32 = row.try_get("quantity")?;
    let unit_price: i64 = row.try_get("unit_price")?;
    Ok(OrderLine {
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        variant_id: VariantId::from_uuid(row.try_get("variant_id")?),
        quantity: quantity.max(0) as u32,
        unit_price: unit_price.max(0) as u64,
    })
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: Order) -> Result<(), StoreError> {
        let (user_id, session_id) = match &order.owner {
            Owner::User(id) => (Some(*id.as_uuid()), None),
            Owner::Guest(token) => (None, Some(token.as_str().to_string())),
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, session_id, recipient, address_line, city, postal_code, country,
                 payment_method, status, payment_status, payment_intent_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(user_id)
        .bind(session_id)
        .bind(&order.shipping.recipient)
        .bind(&order.shipping.address_line)
        .bind(&order.shipping.city)
        .bind(&order.shipping.postal_code)
        .bind(&order.shipping.country)
        .bind(method_to_str(order.payment_method))
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.payment_intent_id)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, line_no, product_id, variant_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind((line_no + 1) as i32)
            .bind(line.product_id.as_uuid())
            .bind(line.variant_id.as_uuid())
            .bind(line.quantity as i32)
            .bind(line.unit_price as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, session_id, recipient, address_line, city, postal_code, country,
                   payment_method, status, payment_status, payment_intent_id, created_at
            FROM orders WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let line_rows = sqlx::query(
            r#"
            SELECT product_id, variant_id, quantity, unit_price
            FROM order_lines WHERE order_id = $1 ORDER BY line_no
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let lines = line_rows
            .iter()
            .map(row_to_order_line)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(row_to_order(&row, lines)?))
    }

    async fn transition_payment(
        &self,
        id: OrderId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE orders SET payment_status = $3 WHERE id = $1 AND payment_status = $2")
                .bind(id.as_uuid())
                .bind(expected.as_str())
                .bind(next.as_str())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if self.get(id).await?.is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(false)
    }

    async fn transition_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .bind(next.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if self.get(id).await?.is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order() -> Order {
        Order::new(
            Owner::User(UserId::new()),
            ShippingInfo {
                recipient: "Ada".to_string(),
                address_line: "1 Way".to_string(),
                city: "London".to_string(),
                postal_code: "N1".to_string(),
                country: "GB".to_string(),
            },
            PaymentMethod::Card,
            vec![OrderLine {
                product_id: ProductId::new(),
                variant_id: VariantId::new(),
                quantity: 1,
                unit_price: 1_000,
            }],
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn payment_cas_applies_exactly_once() {
        let store = InMemoryOrderStore::new();
        let order = order();
        let id = order.id;
        store.insert(order).await.unwrap();

        assert!(
            store
                .transition_payment(id, PaymentStatus::Pending, PaymentStatus::Paid)
                .await
                .unwrap()
        );
        // Replay: the expected state no longer matches.
        assert!(
            !store
                .transition_payment(id, PaymentStatus::Pending, PaymentStatus::Paid)
                .await
                .unwrap()
        );
        assert_eq!(
            store.get(id).await.unwrap().unwrap().payment_status,
            PaymentStatus::Paid
        );
    }

    #[tokio::test]
    async fn status_cas_detects_stale_expectation() {
        let store = InMemoryOrderStore::new();
        let order = order();
        let id = order.id;
        store.insert(order).await.unwrap();

        assert!(
            store
                .transition_status(id, OrderStatus::Pending, OrderStatus::Preparing)
                .await
                .unwrap()
        );
        assert!(
            !store
                .transition_status(id, OrderStatus::Pending, OrderStatus::Cancelled)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let store = InMemoryOrderStore::new();
        assert_eq!(
            store
                .transition_payment(OrderId::new(), PaymentStatus::Pending, PaymentStatus::Paid)
                .await
                .unwrap_err(),
            StoreError::NotFound
        );
    }
}
