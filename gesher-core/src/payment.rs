use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gesher_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tokenized card handed to the gateway at authorization time. The raw PAN
/// never enters the engine; the token comes from the storefront's payment
/// form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub card_token: Masked<String>,
    pub brand: Option<String>,
    pub last4: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayAuthorization {
    pub authorization_ref: String,
    pub authorized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCharge {
    pub transaction_ref: String,
    pub charged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub refund_ref: String,
    pub refunded_at: DateTime<Utc>,
}

/// Gateway failures split by retry eligibility: a decline is a final answer
/// from the issuer, unavailability is transient and safe to retry for
/// idempotent operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Declined by gateway: {0}")]
    Declined(String),
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// The payment-provider capability consumed by the reconciler. Capture and
/// refund carry a caller-supplied operation reference so a retried network
/// call lands on the provider's idempotency layer instead of moving money
/// twice.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        order_id: Uuid,
        amount_agorot: i64,
        card: &CardDetails,
    ) -> Result<GatewayAuthorization, GatewayError>;

    async fn capture(
        &self,
        authorization_ref: &str,
        amount_agorot: i64,
        operation_ref: &str,
    ) -> Result<GatewayCharge, GatewayError>;

    async fn refund(
        &self,
        transaction_ref: &str,
        amount_agorot: i64,
        operation_ref: &str,
    ) -> Result<GatewayRefund, GatewayError>;

    /// Release an authorization without charging it.
    async fn void_authorization(&self, authorization_ref: &str) -> Result<(), GatewayError>;
}
