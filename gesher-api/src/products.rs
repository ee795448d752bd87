use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use gesher_catalog::availability::{AvailabilityRecord, CheckOutcome};
use gesher_catalog::pricing::{self, Recommendation};
use gesher_catalog::product::{Product, ProductVariant};
use gesher_shared::models::events::{AvailabilityChangedEvent, PriceChangedEvent};
use gesher_store::events::topics;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/products", get(list_products).post(create_product))
        .route("/v1/products/{id}", get(get_product))
        .route("/v1/products/{id}/update-price", post(update_price))
        .route("/v1/products/{id}/availability", patch(patch_availability))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub supplier_name: String,
    pub usd_cost_cents: i64,
    pub variants: Option<Vec<ProductVariant>>,
    pub metadata: Option<serde_json::Value>,
    pub override_sell_price_agorot: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProductEnvelope {
    pub product: Product,
    pub recommendation: Recommendation,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub new_usd_cost_cents: i64,
    /// When true, record the check without changing the stored price.
    pub confirm_only: bool,
    pub override_sell_price_agorot: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UpdatePriceResponse {
    pub price_changed: bool,
    pub previous_cost_usd_cents: i64,
    pub new_cost_usd_cents: i64,
    pub new_sell_price_agorot: i64,
    pub recommendation: Recommendation,
}

#[derive(Debug, Deserialize)]
pub struct ProductFlag {
    pub available: bool,
}

#[derive(Debug, Deserialize)]
pub struct VariantFlag {
    pub sku: String,
    pub available: bool,
}

/// Single form: `{variant_sku?, available, reason?}`.
/// Batch form: `{product: {available}, variants: [{sku, available}]}`.
#[derive(Debug, Deserialize)]
pub struct AvailabilityPatchRequest {
    pub variant_sku: Option<String>,
    pub available: Option<bool>,
    pub reason: Option<String>,
    pub product: Option<ProductFlag>,
    pub variants: Option<Vec<VariantFlag>>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityPatchResponse {
    pub updated: u32,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/products
pub async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductEnvelope>), AppError> {
    if req.usd_cost_cents <= 0 {
        return Err(AppError::validation("usd_cost_cents must be positive"));
    }

    let recommendation = pricing::recommend(req.usd_cost_cents, &state.tiers, state.usd_to_ils);
    let sell_price_agorot =
        recommendation.resolved_sell_price_agorot(req.override_sell_price_agorot);

    let mut product = Product::new(
        req.name,
        req.supplier_name,
        req.usd_cost_cents,
        sell_price_agorot,
    );
    if let Some(variants) = req.variants {
        product.variants = variants;
    }
    if let Some(metadata) = req.metadata {
        product.metadata = metadata;
    }
    state.catalog.save_product(&product).await?;

    let mut record = AvailabilityRecord::new(product.id, None);
    record.push_cost(product.usd_cost_cents, product.sell_price_agorot);
    state.catalog.put_availability(&record).await?;

    if let Err(e) = state
        .redis
        .set_product_availability(&product.id.to_string(), true)
        .await
    {
        tracing::warn!("Availability cache seed failed for {}: {}", product.id, e);
    }

    Ok((
        StatusCode::CREATED,
        Json(ProductEnvelope {
            product,
            recommendation,
        }),
    ))
}

/// GET /v1/products
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.catalog.list_products().await?))
}

/// GET /v1/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .catalog
        .get_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", product_id)))?;
    Ok(Json(product))
}

/// POST /v1/products/{id}/update-price
/// Record the outcome of an admin cost check against the supplier listing.
/// `confirm_only` verifies without repricing; otherwise the new cost and
/// the derived (or overridden) sell price are stored and the cost history
/// gains an entry. The recommendation is always returned for comparison.
pub async fn update_price(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<UpdatePriceRequest>,
) -> Result<Json<UpdatePriceResponse>, AppError> {
    if req.new_usd_cost_cents <= 0 {
        return Err(AppError::validation("new_usd_cost_cents must be positive"));
    }

    let mut product = state
        .catalog
        .get_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", product_id)))?;

    let previous_cost_usd_cents = product.usd_cost_cents;
    let price_changed = req.new_usd_cost_cents != previous_cost_usd_cents;
    let recommendation =
        pricing::recommend(req.new_usd_cost_cents, &state.tiers, state.usd_to_ils);

    let mut record = state
        .catalog
        .get_availability(product_id, None)
        .await?
        .unwrap_or_else(|| AvailabilityRecord::new(product_id, None));

    if req.confirm_only {
        record.record_check(if price_changed {
            CheckOutcome::PriceChanged
        } else {
            CheckOutcome::Confirmed
        });
        state.catalog.put_availability(&record).await?;

        return Ok(Json(UpdatePriceResponse {
            price_changed,
            previous_cost_usd_cents,
            new_cost_usd_cents: req.new_usd_cost_cents,
            new_sell_price_agorot: product.sell_price_agorot,
            recommendation,
        }));
    }

    let sell_price_agorot =
        recommendation.resolved_sell_price_agorot(req.override_sell_price_agorot);
    product.update_cost(req.new_usd_cost_cents, sell_price_agorot);
    state.catalog.save_product(&product).await?;

    record.push_cost(req.new_usd_cost_cents, sell_price_agorot);
    state.catalog.put_availability(&record).await?;

    state.publish_event(
        topics::PRICE,
        product_id.to_string(),
        &PriceChangedEvent {
            product_id,
            previous_cost_usd_cents,
            new_cost_usd_cents: req.new_usd_cost_cents,
            new_sell_price_agorot: sell_price_agorot,
            timestamp: chrono::Utc::now().timestamp(),
        },
    );

    Ok(Json(UpdatePriceResponse {
        price_changed,
        previous_cost_usd_cents,
        new_cost_usd_cents: req.new_usd_cost_cents,
        new_sell_price_agorot: sell_price_agorot,
        recommendation,
    }))
}

/// PATCH /v1/products/{id}/availability
pub async fn patch_availability(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<AvailabilityPatchRequest>,
) -> Result<Json<AvailabilityPatchResponse>, AppError> {
    state
        .catalog
        .get_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", product_id)))?;

    let mut changes: Vec<(Option<String>, bool)> = Vec::new();
    if req.product.is_some() || req.variants.is_some() {
        if let Some(product_flag) = req.product {
            changes.push((None, product_flag.available));
        }
        for variant in req.variants.unwrap_or_default() {
            changes.push((Some(variant.sku), variant.available));
        }
    } else {
        let available = req
            .available
            .ok_or_else(|| AppError::validation("available is required"))?;
        changes.push((req.variant_sku.clone(), available));
    }

    let mut updated = 0;
    for (variant_sku, available) in changes {
        let mut record = state
            .catalog
            .get_availability(product_id, variant_sku.as_deref())
            .await?
            .unwrap_or_else(|| AvailabilityRecord::new(product_id, variant_sku.clone()));

        if available {
            record.mark_available();
        } else {
            record.mark_unavailable();
        }
        state.catalog.put_availability(&record).await?;

        if variant_sku.is_none() {
            if let Err(e) = state
                .redis
                .set_product_availability(&product_id.to_string(), available)
                .await
            {
                tracing::warn!("Availability cache update failed for {}: {}", product_id, e);
            }
        }

        state.publish_event(
            topics::AVAILABILITY,
            product_id.to_string(),
            &AvailabilityChangedEvent {
                product_id,
                variant_sku,
                available,
                reason: req.reason.clone(),
                timestamp: chrono::Utc::now().timestamp(),
            },
        );
        updated += 1;
    }

    Ok(Json(AvailabilityPatchResponse { updated }))
}
