use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gesher_core::StoreError;
use gesher_order::aggregate::AggregateError;
use gesher_order::coordinator::CoordinatorError;
use gesher_order::item_machine::ItemStateError;
use gesher_order::models::ItemStatus;
use gesher_order::reconciler::PaymentError;
use serde_json::json;

/// HTTP-facing error taxonomy. Validation is the caller's fault and carries
/// the currently-valid transitions where that helps the UI offer a
/// corrected retry; Conflict means state moved and a fresh read will
/// succeed; External failures leave engine state untouched.
#[derive(Debug)]
pub enum AppError {
    Validation {
        message: String,
        valid_transitions: Option<Vec<ItemStatus>>,
    },
    Conflict(String),
    NotFound(String),
    PaymentRequired(String),
    External(String),
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            valid_transitions: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation {
                message,
                valid_transitions,
            } => {
                let mut body = json!({ "error": message });
                if let Some(valid) = valid_transitions {
                    body["valid_transitions"] = json!(valid);
                }
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AppError::Conflict(message) => (
                StatusCode::CONFLICT,
                Json(json!({ "error": message })),
            )
                .into_response(),
            AppError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": message })),
            )
                .into_response(),
            AppError::PaymentRequired(message) => (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({ "error": message })),
            )
                .into_response(),
            AppError::External(detail) => {
                tracing::warn!("External dependency failure: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "Temporary failure, please try again" })),
                )
                    .into_response()
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal server error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<ItemStateError> for AppError {
    fn from(err: ItemStateError) -> Self {
        match err {
            ItemStateError::InvalidTransition { ref valid, .. } => AppError::Validation {
                message: err.to_string(),
                valid_transitions: Some(valid.clone()),
            },
            ItemStateError::AlreadyCancelled(_)
            | ItemStateError::AlreadyDelivered(_)
            | ItemStateError::NotPending { .. }
            | ItemStateError::SupplierOrderConflict { .. } => AppError::Conflict(err.to_string()),
            ItemStateError::ItemNotFound(id) => AppError::NotFound(format!("item {}", id)),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidState { .. } => AppError::Conflict(err.to_string()),
            PaymentError::AuthorizationDeclined(_)
            | PaymentError::CaptureDeclined(_)
            | PaymentError::RefundDeclined(_) => AppError::PaymentRequired(err.to_string()),
            PaymentError::RefundExceedsCharge { .. } => AppError::Validation {
                message: err.to_string(),
                valid_transitions: None,
            },
            PaymentError::GatewayUnavailable(_) | PaymentError::ReleaseFailed(_) => {
                AppError::External(err.to_string())
            }
            PaymentError::MissingAuthorization | PaymentError::MissingTransaction => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Conflict(message) => AppError::Conflict(message),
            StoreError::Backend(detail) => AppError::Internal(detail),
        }
    }
}

impl From<AggregateError> for AppError {
    fn from(err: AggregateError) -> Self {
        AppError::Validation {
            message: err.to_string(),
            valid_transitions: None,
        }
    }
}

impl From<CoordinatorError> for AppError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Store(e) => e.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
