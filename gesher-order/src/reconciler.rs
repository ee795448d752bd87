use crate::models::{ItemStatus, Order, OrderStatus, PaymentState};
use async_trait::async_trait;
use chrono::Utc;
use gesher_core::payment::{
    CardDetails, GatewayAuthorization, GatewayCharge, GatewayError, GatewayRefund, PaymentGateway,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Operation {operation} is not valid in payment state {}", .state.as_str())]
    InvalidState {
        state: PaymentState,
        operation: &'static str,
    },

    #[error("Authorization declined: {0}")]
    AuthorizationDeclined(String),

    #[error("Capture declined: {0}")]
    CaptureDeclined(String),

    #[error("Refund declined: {0}")]
    RefundDeclined(String),

    #[error("Refund of {requested} agorot exceeds remaining charge of {remaining}")]
    RefundExceedsCharge { requested: i64, remaining: i64 },

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Authorization release failed: {0}")]
    ReleaseFailed(String),

    #[error("Intent carries no authorization reference")]
    MissingAuthorization,

    #[error("Intent carries no transaction reference")]
    MissingTransaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Charged(i64),
    AlreadyCharged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    Refunded { refunded_total_agorot: i64 },
    AlreadyRefunded,
}

/// Flip `Hold` to `ReadyToCharge` once no active item is still awaiting a
/// supplier-ordering decision. Pure derivation; invoked by the aggregate
/// after every item mutation.
pub fn evaluate_readiness(order: &mut Order) -> bool {
    if order.payment.state != PaymentState::Hold {
        return false;
    }

    let mut active = order.items.iter().filter(|i| i.is_active()).peekable();
    if active.peek().is_none() {
        return false;
    }
    if active.any(|i| i.status == ItemStatus::Pending) {
        return false;
    }

    order.payment.state = PaymentState::ReadyToCharge;
    true
}

/// Re-arm a failed intent for another authorization attempt.
pub fn mark_retry(order: &mut Order) -> Result<(), PaymentError> {
    if order.payment.state != PaymentState::Failed {
        return Err(PaymentError::InvalidState {
            state: order.payment.state,
            operation: "mark_retry",
        });
    }
    order.payment.state = PaymentState::RetryPending;
    Ok(())
}

/// Owns the payment-intent lifecycle and reconciles it against the order's
/// aggregate item state. All monetary calls go through the injected
/// gateway; the engine itself never talks to the provider's API directly.
pub struct PaymentReconciler {
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentReconciler {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }

    /// Authorize the full checkout total. A decline is final; gateway
    /// unavailability parks the intent in RETRY_PENDING for a later
    /// re-authorization.
    pub async fn hold(&self, order: &mut Order, card: &CardDetails) -> Result<(), PaymentError> {
        if !matches!(
            order.payment.state,
            PaymentState::Pending | PaymentState::RetryPending
        ) {
            return Err(PaymentError::InvalidState {
                state: order.payment.state,
                operation: "hold",
            });
        }

        let amount = order.pricing.total_agorot;
        match self.gateway.authorize(order.id, amount, card).await {
            Ok(auth) => {
                order.payment.state = PaymentState::Hold;
                order.payment.hold_agorot = amount;
                order.payment.authorization_ref = Some(auth.authorization_ref);
                order.payment.last_error = None;
                order.status = OrderStatus::PaymentHold;
                order.touch();
                tracing::info!(
                    "Authorized {} agorot for order {}",
                    amount,
                    order.order_number
                );
                Ok(())
            }
            Err(GatewayError::Declined(reason)) => {
                order.payment.state = PaymentState::Failed;
                order.payment.last_error = Some(reason.clone());
                order.touch();
                Err(PaymentError::AuthorizationDeclined(reason))
            }
            Err(GatewayError::Unavailable(reason)) => {
                order.payment.state = PaymentState::RetryPending;
                order.payment.last_error = Some(reason.clone());
                order.touch();
                Err(PaymentError::GatewayUnavailable(reason))
            }
        }
    }

    /// Charge the adjusted total as of capture time. Cancellations applied
    /// before capture reduce what is actually charged, so no refund is ever
    /// owed for them.
    pub async fn capture(
        &self,
        order: &mut Order,
        operation_ref: &str,
    ) -> Result<CaptureOutcome, PaymentError> {
        if order.payment.has_operation(operation_ref) {
            return Ok(CaptureOutcome::AlreadyCharged);
        }
        if order.payment.state != PaymentState::ReadyToCharge {
            return Err(PaymentError::InvalidState {
                state: order.payment.state,
                operation: "capture",
            });
        }

        let authorization_ref = order
            .payment
            .authorization_ref
            .clone()
            .ok_or(PaymentError::MissingAuthorization)?;
        let amount = order.pricing.adjusted_total_agorot;

        match self
            .gateway
            .capture(&authorization_ref, amount, operation_ref)
            .await
        {
            Ok(charge) => {
                order.payment.state = PaymentState::Charged;
                order.payment.charged_agorot = amount;
                order.payment.transaction_ref = Some(charge.transaction_ref);
                order.payment.last_error = None;
                order.payment.record_operation(operation_ref);
                order.touch();
                tracing::info!(
                    "Captured {} agorot for order {}",
                    amount,
                    order.order_number
                );
                Ok(CaptureOutcome::Charged(amount))
            }
            Err(GatewayError::Declined(reason)) => {
                order.payment.state = PaymentState::Failed;
                order.payment.last_error = Some(reason.clone());
                order.touch();
                Err(PaymentError::CaptureDeclined(reason))
            }
            Err(GatewayError::Unavailable(reason)) => {
                // State untouched; the same operation_ref is safe to retry.
                order.payment.last_error = Some(reason.clone());
                Err(PaymentError::GatewayUnavailable(reason))
            }
        }
    }

    /// Refund part or all of the captured amount. Never retried
    /// automatically; a replayed operation_ref is a no-op.
    pub async fn issue_refund(
        &self,
        order: &mut Order,
        amount_agorot: i64,
        reason: &str,
        operation_ref: &str,
    ) -> Result<RefundOutcome, PaymentError> {
        if order.payment.has_operation(operation_ref) {
            return Ok(RefundOutcome::AlreadyRefunded);
        }
        if !matches!(
            order.payment.state,
            PaymentState::Charged | PaymentState::PartialRefund
        ) {
            return Err(PaymentError::InvalidState {
                state: order.payment.state,
                operation: "issue_refund",
            });
        }

        let remaining = order.payment.remaining_charge();
        if amount_agorot > remaining {
            return Err(PaymentError::RefundExceedsCharge {
                requested: amount_agorot,
                remaining,
            });
        }

        let transaction_ref = order
            .payment
            .transaction_ref
            .clone()
            .ok_or(PaymentError::MissingTransaction)?;

        match self
            .gateway
            .refund(&transaction_ref, amount_agorot, operation_ref)
            .await
        {
            Ok(_) => {
                order.payment.refunded_agorot += amount_agorot;
                order.payment.state = if order.payment.remaining_charge() == 0 {
                    PaymentState::FullRefund
                } else {
                    PaymentState::PartialRefund
                };
                order.payment.record_operation(operation_ref);
                order.touch();
                tracing::info!(
                    "Refunded {} agorot for order {} ({})",
                    amount_agorot,
                    order.order_number,
                    reason
                );
                Ok(RefundOutcome::Refunded {
                    refunded_total_agorot: order.payment.refunded_agorot,
                })
            }
            Err(GatewayError::Declined(message)) => {
                order.payment.last_error = Some(message.clone());
                Err(PaymentError::RefundDeclined(message))
            }
            Err(GatewayError::Unavailable(message)) => {
                order.payment.last_error = Some(message.clone());
                Err(PaymentError::GatewayUnavailable(message))
            }
        }
    }

    /// Release the hold without charging. No monetary movement.
    pub async fn cancel_authorization(&self, order: &mut Order) -> Result<(), PaymentError> {
        if !matches!(
            order.payment.state,
            PaymentState::Hold | PaymentState::ReadyToCharge
        ) {
            return Err(PaymentError::InvalidState {
                state: order.payment.state,
                operation: "cancel_authorization",
            });
        }

        let authorization_ref = order
            .payment
            .authorization_ref
            .clone()
            .ok_or(PaymentError::MissingAuthorization)?;

        match self.gateway.void_authorization(&authorization_ref).await {
            Ok(()) => {
                order.payment.state = PaymentState::Cancelled;
                order.touch();
                tracing::info!("Released authorization for order {}", order.order_number);
                Ok(())
            }
            Err(GatewayError::Declined(message)) => Err(PaymentError::ReleaseFailed(message)),
            Err(GatewayError::Unavailable(message)) => {
                Err(PaymentError::GatewayUnavailable(message))
            }
        }
    }
}

/// Gateway stand-in used by local wiring and tests. Card tokens prefixed
/// `fail-declined` / `fail-gateway` simulate the two failure classes.
pub struct MockPaymentGateway;

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn authorize(
        &self,
        order_id: Uuid,
        _amount_agorot: i64,
        card: &CardDetails,
    ) -> Result<GatewayAuthorization, GatewayError> {
        match card.card_token.inner().as_str() {
            "fail-declined" => Err(GatewayError::Declined("insufficient funds".to_string())),
            "fail-gateway" => Err(GatewayError::Unavailable("connection reset".to_string())),
            _ => Ok(GatewayAuthorization {
                authorization_ref: format!("auth_{}", order_id.simple()),
                authorized_at: Utc::now(),
            }),
        }
    }

    async fn capture(
        &self,
        authorization_ref: &str,
        _amount_agorot: i64,
        operation_ref: &str,
    ) -> Result<GatewayCharge, GatewayError> {
        Ok(GatewayCharge {
            transaction_ref: format!("txn_{}_{}", authorization_ref, operation_ref),
            charged_at: Utc::now(),
        })
    }

    async fn refund(
        &self,
        transaction_ref: &str,
        _amount_agorot: i64,
        operation_ref: &str,
    ) -> Result<GatewayRefund, GatewayError> {
        Ok(GatewayRefund {
            refund_ref: format!("rf_{}_{}", transaction_ref, operation_ref),
            refunded_at: Utc::now(),
        })
    }

    async fn void_authorization(&self, _authorization_ref: &str) -> Result<(), GatewayError> {
        Ok(())
    }
}
