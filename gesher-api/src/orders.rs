use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use gesher_core::payment::CardDetails;
use gesher_order::aggregate::{self, StatusSuggestion};
use gesher_order::item_machine::ItemStateMachine;
use gesher_order::models::{
    Address, ItemStatus, Order, OrderItem, OrderStatus, PaymentState, VariantDetails,
};
use gesher_order::reconciler::{self, PaymentError};
use gesher_shared::models::events::{ItemCancelledEvent, ItemStatusChangedEvent, RefundIssuedEvent};
use gesher_store::events::topics;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

const ACTOR: &str = "admin";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", get(list_orders).post(create_order))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/status", post(accept_order_status))
        .route("/v1/orders/{id}/payment/retry", post(retry_payment))
        .route(
            "/v1/orders/{id}/items/{item_id}/status",
            post(update_item_status),
        )
        .route("/v1/orders/{id}/items/{item_id}/cancel", post(cancel_item))
        .route(
            "/v1/orders/{id}/items/{item_id}/order-from-supplier",
            post(order_item_from_supplier),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CheckoutItemRequest {
    pub product_id: Uuid,
    pub variant_sku: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub customer_email: String,
    pub shipping_address: Address,
    pub card: CardDetails,
    pub items: Vec<CheckoutItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemStatusRequest {
    pub new_status: ItemStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelItemRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderFromSupplierRequest {
    pub supplier_order_number: String,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptStatusRequest {
    pub new_status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct RetryPaymentRequest {
    pub card: CardDetails,
}

#[derive(Debug, Serialize)]
pub struct OrderEnvelope {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status_suggestion: Option<StatusSuggestion>,
}

#[derive(Debug, Serialize)]
pub struct OrderUpdate {
    pub meets_minimum: bool,
}

#[derive(Debug, Serialize)]
pub struct RefundConfirmation {
    pub amount_agorot: i64,
    pub refunded_total_agorot: i64,
    pub payment_state: PaymentState,
}

#[derive(Debug, Serialize)]
pub struct MutationEnvelope {
    pub order: Order,
    pub order_update: OrderUpdate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status_suggestion: Option<StatusSuggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<RefundConfirmation>,
}

#[derive(Debug, Serialize)]
pub struct ItemEnvelope {
    pub item: OrderItem,
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status_suggestion: Option<StatusSuggestion>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/orders
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list().await?))
}

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderEnvelope>, AppError> {
    let order = load_order(&state, order_id).await?;
    let order_status_suggestion = aggregate::suggest_status(&order);
    Ok(Json(OrderEnvelope {
        order,
        order_status_suggestion,
    }))
}

/// POST /v1/orders
/// Checkout: price the cart from the catalog, place the payment hold, and
/// persist the order. The snapshot carries the payment outcome; a declined
/// or unreachable gateway is visible in `payment.state` and retried via
/// the payment/retry route.
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderEnvelope>), AppError> {
    if req.items.is_empty() {
        return Err(AppError::validation("order must contain at least one item"));
    }

    let mut items = Vec::with_capacity(req.items.len());
    for line in &req.items {
        if line.quantity <= 0 {
            return Err(AppError::validation("quantity must be positive"));
        }

        let product = state
            .catalog
            .get_product(line.product_id)
            .await?
            .ok_or_else(|| AppError::validation(format!("unknown product {}", line.product_id)))?;
        if !product.is_active {
            return Err(AppError::validation(format!(
                "product {} is not active",
                product.name
            )));
        }
        if !product_available(&state, line.product_id, line.variant_sku.as_deref()).await? {
            return Err(AppError::validation(format!(
                "product {} is currently unavailable",
                product.name
            )));
        }

        let variant = match &line.variant_sku {
            Some(sku) => {
                let variant = product.variant(sku).ok_or_else(|| {
                    AppError::validation(format!("unknown variant {} of {}", sku, product.name))
                })?;
                VariantDetails {
                    color: variant.color.clone(),
                    size: variant.size.clone(),
                    sku: Some(variant.sku.clone()),
                }
            }
            None => VariantDetails::default(),
        };

        items.push(OrderItem::new(
            product.id,
            product.name.clone(),
            product.supplier_name.clone(),
            product.sell_price_agorot,
            line.quantity,
            variant,
        ));
    }

    let mut order = Order::new(
        next_order_number(),
        req.customer_email,
        req.shipping_address,
        items,
    );
    aggregate::initialize_pricing(&mut order, &state.rules);

    // The hold outcome (Hold / Failed / RetryPending) is part of the order
    // record either way.
    if let Err(e) = state.reconciler.hold(&mut order, &req.card).await {
        tracing::warn!(
            "Hold failed at checkout for order {}: {}",
            order.order_number,
            e
        );
    }

    state.orders.insert(&order).await?;
    let order_status_suggestion = aggregate::suggest_status(&order);
    Ok((
        StatusCode::CREATED,
        Json(OrderEnvelope {
            order,
            order_status_suggestion,
        }),
    ))
}

/// POST /v1/orders/{id}/payment/retry
/// Re-authorize after a failed or deferred hold.
pub async fn retry_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<RetryPaymentRequest>,
) -> Result<Json<OrderEnvelope>, AppError> {
    let _guard = state.locks.acquire(order_id).await;
    let mut order = load_order(&state, order_id).await?;

    if order.payment.state == PaymentState::Failed {
        reconciler::mark_retry(&mut order)?;
    }
    let hold_result = state.reconciler.hold(&mut order, &req.card).await;

    // Persist whatever the attempt recorded before surfacing the failure.
    state.orders.update(&mut order).await?;
    hold_result?;

    Ok(Json(OrderEnvelope {
        order,
        order_status_suggestion: None,
    }))
}

/// POST /v1/orders/{id}/items/{item_id}/status
pub async fn update_item_status(
    State(state): State<AppState>,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateItemStatusRequest>,
) -> Result<Json<ItemEnvelope>, AppError> {
    let _guard = state.locks.acquire(order_id).await;
    let mut order = load_order(&state, order_id).await?;

    let item = order
        .item_mut(item_id)
        .ok_or_else(|| AppError::NotFound(format!("item {}", item_id)))?;
    let from_status = item.status;
    let item_name = item.name.clone();

    ItemStateMachine::transition(item, req.new_status, req.notes.clone(), ACTOR)?;

    let outcome = aggregate::recompute(&mut order, &state.rules);
    if outcome.became_ready_to_charge {
        capture_if_ready(&state, &mut order).await;
    }

    state.orders.update(&mut order).await?;

    if let Err(e) = state
        .notifier
        .item_status_changed(
            order.customer_email.inner(),
            &order.order_number,
            &item_name,
            req.new_status.as_str(),
        )
        .await
    {
        tracing::warn!("Status notification failed: {}", e);
    }
    state.publish_event(
        topics::ITEM_STATUS,
        order.id.to_string(),
        &ItemStatusChangedEvent {
            order_id: order.id,
            item_id,
            from_status: from_status.as_str().to_string(),
            to_status: req.new_status.as_str().to_string(),
            actor: ACTOR.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        },
    );

    let item = order
        .item(item_id)
        .cloned()
        .ok_or_else(|| AppError::Internal("item vanished during update".to_string()))?;
    Ok(Json(ItemEnvelope {
        item,
        order,
        order_status_suggestion: outcome.suggestion,
    }))
}

/// POST /v1/orders/{id}/items/{item_id}/cancel
/// Whole-item cancellation. Recomputes the order totals; refunds the line
/// if payment was already captured, or releases the hold when nothing
/// remains to charge. A gateway failure aborts the whole call so the item
/// is still cancellable afterwards.
pub async fn cancel_item(
    State(state): State<AppState>,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CancelItemRequest>,
) -> Result<Json<MutationEnvelope>, AppError> {
    let _guard = state.locks.acquire(order_id).await;
    let mut order = load_order(&state, order_id).await?;

    let was_charged = matches!(
        order.payment.state,
        PaymentState::Charged | PaymentState::PartialRefund
    );

    let item = order
        .item_mut(item_id)
        .ok_or_else(|| AppError::NotFound(format!("item {}", item_id)))?;
    let refund_agorot = ItemStateMachine::cancel(item, &req.reason, ACTOR)?;

    let outcome = aggregate::recompute(&mut order, &state.rules);

    let mut refund = None;
    if was_charged {
        let operation_ref = format!("refund-{}", item_id.simple());
        match state
            .reconciler
            .issue_refund(&mut order, refund_agorot, &req.reason, &operation_ref)
            .await?
        {
            reconciler::RefundOutcome::Refunded {
                refunded_total_agorot,
            } => {
                refund = Some(RefundConfirmation {
                    amount_agorot: refund_agorot,
                    refunded_total_agorot,
                    payment_state: order.payment.state,
                });
            }
            reconciler::RefundOutcome::AlreadyRefunded => {}
        }
    } else if outcome.became_ready_to_charge {
        // This cancellation resolved the last outstanding supplier
        // decision; the surviving lines are charged at the adjusted total.
        capture_if_ready(&state, &mut order).await;
    } else if order.active_items().count() == 0
        && matches!(
            order.payment.state,
            PaymentState::Hold | PaymentState::ReadyToCharge
        )
    {
        state.reconciler.cancel_authorization(&mut order).await?;
    }

    state.orders.update(&mut order).await?;

    state.publish_event(
        topics::ORDER_CANCELLED,
        order.id.to_string(),
        &ItemCancelledEvent {
            order_id: order.id,
            item_id,
            reason: req.reason.clone(),
            refund_agorot,
            timestamp: chrono::Utc::now().timestamp(),
        },
    );
    if let Some(confirmation) = &refund {
        state.publish_event(
            topics::REFUND,
            order.id.to_string(),
            &RefundIssuedEvent {
                order_id: order.id,
                amount_agorot: confirmation.amount_agorot,
                remaining_agorot: order.payment.remaining_charge(),
                operation_ref: format!("refund-{}", item_id.simple()),
                timestamp: chrono::Utc::now().timestamp(),
            },
        );
        if let Err(e) = state
            .notifier
            .refund_issued(
                order.customer_email.inner(),
                &order.order_number,
                confirmation.amount_agorot,
            )
            .await
        {
            tracing::warn!("Refund notification failed: {}", e);
        }
    }

    Ok(Json(MutationEnvelope {
        order_update: OrderUpdate {
            meets_minimum: outcome.meets_minimum,
        },
        order_status_suggestion: outcome.suggestion,
        refund,
        order,
    }))
}

/// POST /v1/orders/{id}/items/{item_id}/order-from-supplier
/// Idempotent on the supplier order number.
pub async fn order_item_from_supplier(
    State(state): State<AppState>,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<OrderFromSupplierRequest>,
) -> Result<Json<ItemEnvelope>, AppError> {
    let _guard = state.locks.acquire(order_id).await;
    let mut order = load_order(&state, order_id).await?;

    let item = order
        .item_mut(item_id)
        .ok_or_else(|| AppError::NotFound(format!("item {}", item_id)))?;

    ItemStateMachine::mark_ordered_from_supplier(
        item,
        &req.supplier_order_number,
        req.tracking_number.clone(),
        ACTOR,
    )?;

    let outcome = aggregate::recompute(&mut order, &state.rules);
    if outcome.became_ready_to_charge {
        capture_if_ready(&state, &mut order).await;
    }

    state.orders.update(&mut order).await?;

    let item = order
        .item(item_id)
        .cloned()
        .ok_or_else(|| AppError::Internal("item vanished during update".to_string()))?;
    Ok(Json(ItemEnvelope {
        item,
        order,
        order_status_suggestion: outcome.suggestion,
    }))
}

/// POST /v1/orders/{id}/status
/// Operator acceptance of a suggested order-level status; never automatic.
pub async fn accept_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<AcceptStatusRequest>,
) -> Result<Json<OrderEnvelope>, AppError> {
    let _guard = state.locks.acquire(order_id).await;
    let mut order = load_order(&state, order_id).await?;

    aggregate::accept_status(&mut order, req.new_status)?;
    state.orders.update(&mut order).await?;

    Ok(Json(OrderEnvelope {
        order,
        order_status_suggestion: None,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

async fn load_order(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    state
        .orders
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))
}

/// Capture once readiness flips. Gateway unavailability leaves the intent
/// in READY_TO_CHARGE; the deterministic operation reference makes the next
/// attempt idempotent.
async fn capture_if_ready(state: &AppState, order: &mut Order) {
    let operation_ref = format!("capture-{}", order.id.simple());
    match state.reconciler.capture(order, &operation_ref).await {
        Ok(_) => {}
        Err(PaymentError::GatewayUnavailable(e)) => {
            tracing::warn!(
                "Capture deferred for order {}: gateway unavailable ({})",
                order.order_number,
                e
            );
        }
        Err(e) => {
            tracing::error!("Capture failed for order {}: {}", order.order_number, e);
        }
    }
}

/// Availability check with the Redis flag as a cache in front of the
/// catalog store. Cache errors fall back to the store.
async fn product_available(
    state: &AppState,
    product_id: Uuid,
    variant_sku: Option<&str>,
) -> Result<bool, AppError> {
    if variant_sku.is_none() {
        if let Ok(Some(available)) = state
            .redis
            .get_product_availability(&product_id.to_string())
            .await
        {
            return Ok(available);
        }
    }

    let record = state
        .catalog
        .get_availability(product_id, variant_sku)
        .await?;
    // No record yet means the product has never been flagged.
    Ok(record.map(|r| r.available).unwrap_or(true))
}

fn next_order_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("GS-{}", suffix[..8].to_uppercase())
}
