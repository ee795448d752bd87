use crate::aggregate::{self, CheckoutRules};
use crate::item_machine::ItemStateMachine;
use crate::locks::OrderLocks;
use crate::models::{ItemStatus, Order, PaymentState};
use crate::reconciler::{PaymentError, PaymentReconciler};
use crate::repository::OrderRepository;
use gesher_catalog::store::CatalogStore;
use gesher_core::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

pub const SUPPLIER_UNAVAILABLE_REASON: &str = "supplier_unavailable";

/// Reference to one pending item inside a supplier batch. Carries enough
/// context for the operator to place the upstream order by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemRef {
    pub order_id: Uuid,
    pub order_number: String,
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub variant_sku: Option<String>,
    pub name: String,
    pub quantity: i32,
    pub price_agorot: i64,
}

/// Cross-order grouping of pending items for one supplier. Ephemeral:
/// built on demand, discarded once the commit lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierBatch {
    pub supplier_name: String,
    pub items: Vec<BatchItemRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierOrderMeta {
    pub supplier_order_number: String,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub item_id: Uuid,
    pub error: String,
}

/// Per-item results of one bulk commit. Partial success is a normal
/// outcome, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_ordered: u32,
    pub total_unavailable: u32,
    pub total_failed: u32,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives the bulk supplier-ordering workflow across orders. Each item's
/// commit is its own transaction boundary: one unreachable or concurrently
/// mutated item never blocks the rest of the batch.
pub struct FulfillmentCoordinator {
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn CatalogStore>,
    reconciler: Arc<PaymentReconciler>,
    locks: Arc<OrderLocks>,
    rules: CheckoutRules,
}

const ACTOR: &str = "fulfillment";

impl FulfillmentCoordinator {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogStore>,
        reconciler: Arc<PaymentReconciler>,
        locks: Arc<OrderLocks>,
        rules: CheckoutRules,
    ) -> Self {
        Self {
            orders,
            catalog,
            reconciler,
            locks,
            rules,
        }
    }

    /// Group all pending items across open orders by supplier name.
    pub async fn pending_batches(&self) -> Result<Vec<SupplierBatch>, CoordinatorError> {
        let open = self.orders.list_open().await?;

        let mut grouped: BTreeMap<String, Vec<BatchItemRef>> = BTreeMap::new();
        for order in &open {
            for item in order.items.iter().filter(|i| i.status == ItemStatus::Pending) {
                grouped
                    .entry(item.supplier_name.clone())
                    .or_default()
                    .push(BatchItemRef {
                        order_id: order.id,
                        order_number: order.order_number.clone(),
                        item_id: item.id,
                        product_id: item.product_id,
                        variant_sku: item.variant.sku.clone(),
                        name: item.name.clone(),
                        quantity: item.quantity,
                        price_agorot: item.price_agorot,
                    });
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(supplier_name, items)| SupplierBatch {
                supplier_name,
                items,
            })
            .collect())
    }

    /// Apply one batch's outcomes. Items in neither list stay pending for a
    /// later run. Per-item failures are recorded and skipped.
    pub async fn commit(
        &self,
        supplier_name: &str,
        ordered_item_ids: &[Uuid],
        unavailable_item_ids: &[Uuid],
        meta: &SupplierOrderMeta,
    ) -> Result<BatchSummary, CoordinatorError> {
        let index = self.item_index().await?;
        let mut summary = BatchSummary::default();

        for &item_id in ordered_item_ids {
            match self
                .apply_ordered(index.get(&item_id).copied(), item_id, meta)
                .await
            {
                Ok(()) => summary.total_ordered += 1,
                Err(error) => {
                    tracing::warn!(
                        "Bulk order for supplier {}: item {} failed: {}",
                        supplier_name,
                        item_id,
                        error
                    );
                    summary.total_failed += 1;
                    summary.failures.push(BatchFailure { item_id, error });
                }
            }
        }

        for &item_id in unavailable_item_ids {
            match self
                .apply_unavailable(index.get(&item_id).copied(), item_id)
                .await
            {
                Ok(()) => summary.total_unavailable += 1,
                Err(error) => {
                    tracing::warn!(
                        "Bulk unavailable for supplier {}: item {} failed: {}",
                        supplier_name,
                        item_id,
                        error
                    );
                    summary.total_failed += 1;
                    summary.failures.push(BatchFailure { item_id, error });
                }
            }
        }

        tracing::info!(
            "Supplier batch {} committed: {} ordered, {} unavailable, {} failed",
            supplier_name,
            summary.total_ordered,
            summary.total_unavailable,
            summary.total_failed
        );
        Ok(summary)
    }

    async fn item_index(&self) -> Result<HashMap<Uuid, Uuid>, CoordinatorError> {
        let open = self.orders.list_open().await?;
        let mut index = HashMap::new();
        for order in &open {
            for item in &order.items {
                index.insert(item.id, order.id);
            }
        }
        Ok(index)
    }

    async fn apply_ordered(
        &self,
        order_id: Option<Uuid>,
        item_id: Uuid,
        meta: &SupplierOrderMeta,
    ) -> Result<(), String> {
        let order_id = order_id.ok_or("item not found in any open order")?;
        let _guard = self.locks.acquire(order_id).await;

        let mut order = self.load(order_id).await?;
        let item = order
            .item_mut(item_id)
            .ok_or("item no longer on its order")?;

        ItemStateMachine::mark_ordered_from_supplier(
            item,
            &meta.supplier_order_number,
            meta.tracking_number.clone(),
            ACTOR,
        )
        .map_err(|e| e.to_string())?;

        let outcome = aggregate::recompute(&mut order, &self.rules);
        if outcome.became_ready_to_charge {
            self.capture(&mut order).await;
        }

        self.orders.update(&mut order).await.map_err(|e| e.to_string())
    }

    async fn apply_unavailable(
        &self,
        order_id: Option<Uuid>,
        item_id: Uuid,
    ) -> Result<(), String> {
        let order_id = order_id.ok_or("item not found in any open order")?;
        let _guard = self.locks.acquire(order_id).await;

        let mut order = self.load(order_id).await?;
        let item = order
            .item_mut(item_id)
            .ok_or("item no longer on its order")?;
        let product_id = item.product_id;
        let variant_sku = item.variant.sku.clone();

        ItemStateMachine::cancel(item, SUPPLIER_UNAVAILABLE_REASON, ACTOR)
            .map_err(|e| e.to_string())?;
        let outcome = aggregate::recompute(&mut order, &self.rules);

        // Marking an item unavailable is itself a supplier decision; if it
        // was the last one outstanding, the surviving lines are charged now.
        if outcome.became_ready_to_charge {
            self.capture(&mut order).await;
        }

        // A pending item blocks capture, so the payment can only be holding
        // funds here; release it when nothing remains to charge.
        if order.active_items().count() == 0
            && matches!(
                order.payment.state,
                PaymentState::Hold | PaymentState::ReadyToCharge
            )
        {
            if let Err(e) = self.reconciler.cancel_authorization(&mut order).await {
                tracing::warn!(
                    "Could not release authorization for order {}: {}",
                    order.order_number,
                    e
                );
            }
        }

        self.orders
            .update(&mut order)
            .await
            .map_err(|e| e.to_string())?;

        // Second half of the per-item commit: the catalog learns the
        // supplier cannot deliver this product/variant.
        let mut record = self
            .catalog
            .get_availability(product_id, variant_sku.as_deref())
            .await
            .map_err(|e| e.to_string())?
            .unwrap_or_else(|| {
                gesher_catalog::availability::AvailabilityRecord::new(
                    product_id,
                    variant_sku.clone(),
                )
            });
        record.mark_unavailable();
        self.catalog
            .put_availability(&record)
            .await
            .map_err(|e| e.to_string())
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, String> {
        self.orders
            .get(order_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("order {} not found", order_id))
    }

    async fn capture(&self, order: &mut Order) {
        let operation_ref = format!("capture-{}", order.id.simple());
        match self.reconciler.capture(order, &operation_ref).await {
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
}
