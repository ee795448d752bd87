use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification dispatch failed: {0}")]
    DispatchFailed(String),
}

/// Customer notification dispatch (email/SMS). Callers tolerate failure:
/// a dropped mail must never fail or roll back an order mutation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn item_status_changed(
        &self,
        email: &str,
        order_number: &str,
        item_name: &str,
        new_status: &str,
    ) -> Result<(), NotifyError>;

    async fn refund_issued(
        &self,
        email: &str,
        order_number: &str,
        amount_agorot: i64,
    ) -> Result<(), NotifyError>;
}

/// Log-only dispatcher used until a real provider is wired in.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn item_status_changed(
        &self,
        _email: &str,
        order_number: &str,
        item_name: &str,
        new_status: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            "Notify: order {} item '{}' moved to {}",
            order_number,
            item_name,
            new_status
        );
        Ok(())
    }

    async fn refund_issued(
        &self,
        _email: &str,
        order_number: &str,
        amount_agorot: i64,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            "Notify: order {} refunded {} agorot",
            order_number,
            amount_agorot
        );
        Ok(())
    }
}
