use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gesher_core::StoreError;
use gesher_order::models::{ItemStatus, Order, OrderItem, OrderStatus};
use gesher_order::repository::OrderRepository;
use gesher_shared::pii::Masked;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    ordered_at: DateTime<Utc>,
    status: String,
    customer_email: String,
    shipping_address: serde_json::Value,
    pricing: serde_json::Value,
    payment: serde_json::Value,
    version: i64,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    product_id: Uuid,
    name: String,
    supplier_name: String,
    price_agorot: i64,
    quantity: i32,
    status: String,
    variant: serde_json::Value,
    cancellation: Option<serde_json::Value>,
    supplier_order: Option<serde_json::Value>,
    audit: serde_json::Value,
}

impl OrderItemRow {
    fn into_item(self) -> Result<OrderItem, StoreError> {
        Ok(OrderItem {
            id: self.id,
            product_id: self.product_id,
            name: self.name,
            supplier_name: self.supplier_name,
            price_agorot: self.price_agorot,
            quantity: self.quantity,
            status: ItemStatus::from_str(&self.status)
                .ok_or_else(|| backend(format!("unknown item status {}", self.status)))?,
            variant: serde_json::from_value(self.variant).map_err(backend)?,
            cancellation: self
                .cancellation
                .map(serde_json::from_value)
                .transpose()
                .map_err(backend)?,
            supplier_order: self
                .supplier_order
                .map(serde_json::from_value)
                .transpose()
                .map_err(backend)?,
            audit: serde_json::from_value(self.audit).map_err(backend)?,
        })
    }
}

impl PgOrderRepository {
    async fn fetch(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, order_number, ordered_at, status, customer_email, shipping_address, \
             pricing, payment, version, updated_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT id, product_id, name, supplier_name, price_agorot, quantity, status, \
             variant, cancellation, supplier_order, audit \
             FROM order_items WHERE order_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let items = item_rows
            .into_iter()
            .map(OrderItemRow::into_item)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Order {
            id: row.id,
            order_number: row.order_number,
            ordered_at: row.ordered_at,
            status: OrderStatus::from_str(&row.status)
                .ok_or_else(|| backend(format!("unknown order status {}", row.status)))?,
            customer_email: Masked(row.customer_email),
            shipping_address: serde_json::from_value(row.shipping_address).map_err(backend)?,
            pricing: serde_json::from_value(row.pricing).map_err(backend)?,
            payment: serde_json::from_value(row.payment).map_err(backend)?,
            items,
            version: row.version,
            updated_at: row.updated_at,
        }))
    }

    async fn insert_items(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order: &Order,
    ) -> Result<(), StoreError> {
        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items \
                 (id, order_id, position, product_id, name, supplier_name, price_agorot, \
                  quantity, status, variant, cancellation, supplier_order, audit) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .bind(item.id)
            .bind(order.id)
            .bind(position as i32)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(&item.supplier_name)
            .bind(item.price_agorot)
            .bind(item.quantity)
            .bind(item.status.as_str())
            .bind(serde_json::to_value(&item.variant).map_err(backend)?)
            .bind(
                item.cancellation
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()
                    .map_err(backend)?,
            )
            .bind(
                item.supplier_order
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()
                    .map_err(backend)?,
            )
            .bind(serde_json::to_value(&item.audit).map_err(backend)?)
            .execute(&mut **tx)
            .await
            .map_err(backend)?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO orders \
             (id, order_number, ordered_at, status, customer_email, shipping_address, \
              pricing, payment, version, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.ordered_at)
        .bind(order.status.as_str())
        .bind(order.customer_email.inner())
        .bind(serde_json::to_value(&order.shipping_address).map_err(backend)?)
        .bind(serde_json::to_value(&order.pricing).map_err(backend)?)
        .bind(serde_json::to_value(&order.payment).map_err(backend)?)
        .bind(order.version)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        Self::insert_items(&mut tx, order).await?;
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        self.fetch(id).await
    }

    async fn update(&self, order: &mut Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let result = sqlx::query(
            "UPDATE orders SET status = $1, pricing = $2, payment = $3, \
             version = version + 1, updated_at = $4 \
             WHERE id = $5 AND version = $6",
        )
        .bind(order.status.as_str())
        .bind(serde_json::to_value(&order.pricing).map_err(backend)?)
        .bind(serde_json::to_value(&order.payment).map_err(backend)?)
        .bind(order.updated_at)
        .bind(order.id)
        .bind(order.version)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM orders WHERE id = $1")
                    .bind(order.id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(backend)?;
            return match exists {
                Some(_) => Err(StoreError::Conflict(format!(
                    "order {} was modified concurrently",
                    order.id
                ))),
                None => Err(StoreError::NotFound(order.id.to_string())),
            };
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        Self::insert_items(&mut tx, order).await?;

        tx.commit().await.map_err(backend)?;
        order.version += 1;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Order>, StoreError> {
        let ids: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM orders ORDER BY ordered_at")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut orders = Vec::with_capacity(ids.len());
        for (id,) in ids {
            if let Some(order) = self.fetch(id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    async fn list_open(&self) -> Result<Vec<Order>, StoreError> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM orders WHERE status NOT IN ('DELIVERED', 'CANCELLED') \
             ORDER BY ordered_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut orders = Vec::with_capacity(ids.len());
        for (id,) in ids {
            if let Some(order) = self.fetch(id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}
