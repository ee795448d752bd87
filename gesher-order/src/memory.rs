use crate::models::Order;
use crate::repository::OrderRepository;
use async_trait::async_trait;
use gesher_core::StoreError;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// HashMap-backed order repository with the same optimistic-versioning
/// contract as the Postgres implementation. Used by tests and local
/// tooling.
pub struct InMemoryOrders {
    inner: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryOrders {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if map.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.id
            )));
        }
        map.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(map.get(&id).cloned())
    }

    async fn update(&self, order: &mut Order) -> Result<(), StoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let stored = map
            .get(&order.id)
            .ok_or_else(|| StoreError::NotFound(order.id.to_string()))?;

        if stored.version != order.version {
            return Err(StoreError::Conflict(format!(
                "order {} was modified concurrently",
                order.id
            )));
        }

        order.version += 1;
        map.insert(order.id, order.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Order>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut orders: Vec<Order> = map.values().cloned().collect();
        orders.sort_by(|a, b| a.ordered_at.cmp(&b.ordered_at));
        Ok(orders)
    }

    async fn list_open(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|o| o.is_open())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, OrderItem, VariantDetails};

    fn order() -> Order {
        Order::new(
            "GS-3001".to_string(),
            "noa@example.com".to_string(),
            Address {
                full_name: "Noa Levi".to_string(),
                street: "Herzl 12".to_string(),
                city: "Tel Aviv".to_string(),
                postal_code: "6688101".to_string(),
                country: "IL".to_string(),
                phone: "+972501234567".to_string().into(),
            },
            vec![OrderItem::new(
                Uuid::new_v4(),
                "Item".to_string(),
                "supplier".to_string(),
                10_000,
                1,
                VariantDetails::default(),
            )],
        )
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let repo = InMemoryOrders::new();
        let mut order = order();
        repo.insert(&order).await.unwrap();

        repo.update(&mut order).await.unwrap();
        assert_eq!(order.version, 1);
        assert_eq!(repo.get(order.id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let repo = InMemoryOrders::new();
        let order = order();
        repo.insert(&order).await.unwrap();

        let mut copy_a = repo.get(order.id).await.unwrap().unwrap();
        let mut copy_b = repo.get(order.id).await.unwrap().unwrap();

        repo.update(&mut copy_a).await.unwrap();
        let err = repo.update(&mut copy_b).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
