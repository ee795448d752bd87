use async_trait::async_trait;
use gesher_catalog::availability::AvailabilityRecord;
use gesher_catalog::product::Product;
use gesher_catalog::store::CatalogStore;
use gesher_core::StoreError;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

// Variant SKUs are stored as '' rather than NULL so the (product_id,
// variant_sku) primary key stays total.
fn sku_column(variant_sku: Option<&str>) -> &str {
    variant_sku.unwrap_or("")
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    supplier_name: String,
    usd_cost_cents: i64,
    sell_price_agorot: i64,
    is_active: bool,
    variants: serde_json::Value,
    metadata: serde_json::Value,
}

impl ProductRow {
    fn into_product(self) -> Result<Product, StoreError> {
        Ok(Product {
            id: self.id,
            name: self.name,
            supplier_name: self.supplier_name,
            usd_cost_cents: self.usd_cost_cents,
            sell_price_agorot: self.sell_price_agorot,
            is_active: self.is_active,
            variants: serde_json::from_value(self.variants).map_err(backend)?,
            metadata: self.metadata,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AvailabilityRow {
    product_id: Uuid,
    variant_sku: String,
    available: bool,
    last_checked: Option<serde_json::Value>,
    cost_history: serde_json::Value,
}

impl AvailabilityRow {
    fn into_record(self) -> Result<AvailabilityRecord, StoreError> {
        Ok(AvailabilityRecord {
            product_id: self.product_id,
            variant_sku: if self.variant_sku.is_empty() {
                None
            } else {
                Some(self.variant_sku)
            },
            available: self.available,
            last_checked: self
                .last_checked
                .map(serde_json::from_value)
                .transpose()
                .map_err(backend)?,
            cost_history: serde_json::from_value(self.cost_history).map_err(backend)?,
        })
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT id, name, supplier_name, usd_cost_cents, sell_price_agorot, is_active, \
             variants, metadata FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(ProductRow::into_product).transpose()
    }

    async fn save_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO products \
             (id, name, supplier_name, usd_cost_cents, sell_price_agorot, is_active, variants, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
             name = EXCLUDED.name, supplier_name = EXCLUDED.supplier_name, \
             usd_cost_cents = EXCLUDED.usd_cost_cents, \
             sell_price_agorot = EXCLUDED.sell_price_agorot, \
             is_active = EXCLUDED.is_active, variants = EXCLUDED.variants, \
             metadata = EXCLUDED.metadata",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.supplier_name)
        .bind(product.usd_cost_cents)
        .bind(product.sell_price_agorot)
        .bind(product.is_active)
        .bind(serde_json::to_value(&product.variants).map_err(backend)?)
        .bind(&product.metadata)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            "SELECT id, name, supplier_name, usd_cost_cents, sell_price_agorot, is_active, \
             variants, metadata FROM products ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(ProductRow::into_product).collect()
    }

    async fn get_availability(
        &self,
        product_id: Uuid,
        variant_sku: Option<&str>,
    ) -> Result<Option<AvailabilityRecord>, StoreError> {
        let row: Option<AvailabilityRow> = sqlx::query_as(
            "SELECT product_id, variant_sku, available, last_checked, cost_history \
             FROM availability_records WHERE product_id = $1 AND variant_sku = $2",
        )
        .bind(product_id)
        .bind(sku_column(variant_sku))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(AvailabilityRow::into_record).transpose()
    }

    async fn put_availability(&self, record: &AvailabilityRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO availability_records \
             (product_id, variant_sku, available, last_checked, cost_history) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (product_id, variant_sku) DO UPDATE SET \
             available = EXCLUDED.available, last_checked = EXCLUDED.last_checked, \
             cost_history = EXCLUDED.cost_history",
        )
        .bind(record.product_id)
        .bind(sku_column(record.variant_sku.as_deref()))
        .bind(record.available)
        .bind(
            record
                .last_checked
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(backend)?,
        )
        .bind(serde_json::to_value(&record.cost_history).map_err(backend)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}
