use crate::models::Order;
use async_trait::async_trait;
use gesher_core::StoreError;
use uuid::Uuid;

/// Order persistence boundary. Writes are optimistic: `update` compares the
/// stored version against the one the caller loaded and rejects stale
/// writes with `StoreError::Conflict`.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Version-checked write. Bumps `order.version` on success so the
    /// caller's copy stays current.
    async fn update(&self, order: &mut Order) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<Order>, StoreError>;

    /// Orders that are not terminally closed.
    async fn list_open(&self) -> Result<Vec<Order>, StoreError>;
}
