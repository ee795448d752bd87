use crate::middleware::resiliency::CircuitBreaker;
use gesher_catalog::pricing::TierConfig;
use gesher_catalog::store::CatalogStore;
use gesher_core::notify::Notifier;
use gesher_order::aggregate::CheckoutRules;
use gesher_order::coordinator::FulfillmentCoordinator;
use gesher_order::locks::OrderLocks;
use gesher_order::reconciler::PaymentReconciler;
use gesher_order::repository::OrderRepository;
use gesher_store::{EventProducer, RedisClient};
use std::sync::Arc;
use std::time::Duration;

pub struct Resiliency {
    pub payment_cb: CircuitBreaker,
}

impl Resiliency {
    pub fn new() -> Self {
        Self {
            payment_cb: CircuitBreaker::new("payment", 5, Duration::from_secs(30)),
        }
    }
}

impl Default for Resiliency {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderRepository>,
    pub catalog: Arc<dyn CatalogStore>,
    pub reconciler: Arc<PaymentReconciler>,
    pub coordinator: Arc<FulfillmentCoordinator>,
    pub notifier: Arc<dyn Notifier>,
    pub events: Arc<EventProducer>,
    pub redis: Arc<RedisClient>,
    pub locks: Arc<OrderLocks>,
    pub rules: CheckoutRules,
    pub tiers: TierConfig,
    pub usd_to_ils: f64,
    pub resiliency: Arc<Resiliency>,
}

impl AppState {
    /// Fire-and-forget event publish; a broker outage never fails or delays
    /// the mutation that produced the event.
    pub fn publish_event<T: serde::Serialize>(&self, topic: &'static str, key: String, event: &T) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Could not serialize event for {}: {}", topic, e);
                return;
            }
        };
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = events.publish(topic, &key, &payload).await {
                tracing::warn!("Event publish to {} failed: {}", topic, e);
            }
        });
    }
}
