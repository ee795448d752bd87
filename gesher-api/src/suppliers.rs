use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use gesher_order::coordinator::{BatchSummary, SupplierBatch, SupplierOrderMeta};
use gesher_shared::models::events::SupplierBatchCommittedEvent;
use gesher_store::events::topics;
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/suppliers/pending", get(pending_batches))
        .route("/v1/suppliers/{name}/bulk-order", post(bulk_order))
}

#[derive(Debug, Deserialize)]
pub struct BulkOrderRequest {
    pub ordered_item_ids: Vec<Uuid>,
    pub unavailable_item_ids: Vec<Uuid>,
    pub supplier_order_meta: SupplierOrderMeta,
}

/// GET /v1/suppliers/pending
/// All pending items across open orders, grouped by supplier.
pub async fn pending_batches(
    State(state): State<AppState>,
) -> Result<Json<Vec<SupplierBatch>>, AppError> {
    Ok(Json(state.coordinator.pending_batches().await?))
}

/// POST /v1/suppliers/{name}/bulk-order
/// Apply one supplier batch's outcomes. Partial failure is reported in the
/// summary, never as an error status.
pub async fn bulk_order(
    State(state): State<AppState>,
    Path(supplier_name): Path<String>,
    Json(req): Json<BulkOrderRequest>,
) -> Result<Json<BatchSummary>, AppError> {
    let ordered: HashSet<Uuid> = req.ordered_item_ids.iter().copied().collect();
    if req
        .unavailable_item_ids
        .iter()
        .any(|id| ordered.contains(id))
    {
        return Err(AppError::validation(
            "ordered_item_ids and unavailable_item_ids must be disjoint",
        ));
    }

    // Resolve product ids for the unavailable items up front so their
    // cached availability flags can be dropped after the commit.
    let affected_products: Vec<Uuid> = state
        .coordinator
        .pending_batches()
        .await?
        .into_iter()
        .filter(|batch| batch.supplier_name == supplier_name)
        .flat_map(|batch| batch.items)
        .filter(|item| req.unavailable_item_ids.contains(&item.item_id))
        .map(|item| item.product_id)
        .collect();

    let summary = state
        .coordinator
        .commit(
            &supplier_name,
            &req.ordered_item_ids,
            &req.unavailable_item_ids,
            &req.supplier_order_meta,
        )
        .await?;

    for product_id in affected_products {
        if let Err(e) = state
            .redis
            .delete_product_availability(&product_id.to_string())
            .await
        {
            tracing::warn!(
                "Could not invalidate availability cache for {}: {}",
                product_id,
                e
            );
        }
    }

    state.publish_event(
        topics::SUPPLIER_BATCH,
        supplier_name.clone(),
        &SupplierBatchCommittedEvent {
            supplier_name,
            total_ordered: summary.total_ordered,
            total_unavailable: summary.total_unavailable,
            total_failed: summary.total_failed,
            timestamp: chrono::Utc::now().timestamp(),
        },
    );

    Ok(Json(summary))
}
