use crate::availability::{AvailabilityLedger, AvailabilityRecord};
use crate::product::Product;
use async_trait::async_trait;
use gesher_core::StoreError;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Catalog persistence boundary: products plus their availability records.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn save_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    async fn get_availability(
        &self,
        product_id: Uuid,
        variant_sku: Option<&str>,
    ) -> Result<Option<AvailabilityRecord>, StoreError>;

    async fn put_availability(&self, record: &AvailabilityRecord) -> Result<(), StoreError>;
}

/// HashMap-backed catalog used by tests and local tooling.
pub struct InMemoryCatalog {
    products: RwLock<HashMap<Uuid, Product>>,
    ledger: RwLock<AvailabilityLedger>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(HashMap::new()),
            ledger: RwLock::new(AvailabilityLedger::new()),
        }
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(products.get(&id).cloned())
    }

    async fn save_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(products.values().cloned().collect())
    }

    async fn get_availability(
        &self,
        product_id: Uuid,
        variant_sku: Option<&str>,
    ) -> Result<Option<AvailabilityRecord>, StoreError> {
        let ledger = self
            .ledger
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(ledger.get(product_id, variant_sku).cloned())
    }

    async fn put_availability(&self, record: &AvailabilityRecord) -> Result<(), StoreError> {
        let mut ledger = self
            .ledger
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        ledger.put(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn product_round_trip() {
        let catalog = InMemoryCatalog::new();
        let product = Product::new(
            "Wireless Earbuds".to_string(),
            "us-gadget-depot".to_string(),
            4_000,
            25_600,
        );
        let id = product.id;

        catalog.save_product(&product).await.unwrap();
        let loaded = catalog.get_product(id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Wireless Earbuds");
        assert_eq!(loaded.sell_price_agorot, 25_600);
    }

    #[tokio::test]
    async fn availability_upsert_supersedes() {
        let catalog = InMemoryCatalog::new();
        let product_id = Uuid::new_v4();

        let mut record = AvailabilityRecord::new(product_id, None);
        record.mark_unavailable();
        catalog.put_availability(&record).await.unwrap();

        let loaded = catalog.get_availability(product_id, None).await.unwrap().unwrap();
        assert!(!loaded.available);
    }
}
