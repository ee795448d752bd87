use redis::{AsyncCommands, RedisResult};
use tracing::info;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Cache-aside availability flag consulted at checkout before hitting
    /// the catalog store. Stored as 0/1.
    pub async fn set_product_availability(
        &self,
        product_id: &str,
        available: bool,
    ) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("product:{}:availability", product_id);
        conn.set::<_, _, ()>(key, if available { 1 } else { 0 })
            .await?;
        info!("Availability cache set: {} -> {}", product_id, available);
        Ok(())
    }

    pub async fn get_product_availability(&self, product_id: &str) -> RedisResult<Option<bool>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("product:{}:availability", product_id);
        let value: Option<i32> = conn.get(key).await?;
        Ok(value.map(|v| v != 0))
    }

    /// Drop the cached flag so the next read re-seeds it from the store.
    pub async fn delete_product_availability(&self, product_id: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("product:{}:availability", product_id);
        conn.del(key).await
    }

    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}
