use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

/// Kafka topics the engine publishes to. The notification dispatcher and
/// analytics consumers subscribe downstream.
pub mod topics {
    pub const ITEM_STATUS: &str = "order.item-status";
    pub const ORDER_CANCELLED: &str = "order.cancelled";
    pub const REFUND: &str = "payment.refund";
    pub const AVAILABILITY: &str = "catalog.availability";
    pub const PRICE: &str = "catalog.price";
    pub const SUPPLIER_BATCH: &str = "supplier.batch";
}

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    "Published to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to publish to {}: {}", topic, e);
                Err(e)
            }
        }
    }

    /// Serialize and publish a domain event. Serialization failures are
    /// programming errors and reported as such.
    pub async fn publish_json<T: serde::Serialize>(
        &self,
        topic: &str,
        key: &str,
        event: &T,
    ) -> Result<(), String> {
        let payload = serde_json::to_string(event).map_err(|e| e.to_string())?;
        self.publish(topic, key, &payload)
            .await
            .map_err(|e| e.to_string())
    }
}
