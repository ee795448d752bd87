use chrono::{DateTime, Utc};
use gesher_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-item fulfillment pipeline, in shipping order. `Cancelled` sits
/// outside the pipeline as a parallel terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    Ordered,
    ArrivedUsWarehouse,
    ShippedToIsrael,
    CustomsIsrael,
    ArrivedIsraelWarehouse,
    ShippedToCustomer,
    Delivered,
    Cancelled,
}

impl ItemStatus {
    pub const PIPELINE: [ItemStatus; 8] = [
        ItemStatus::Pending,
        ItemStatus::Ordered,
        ItemStatus::ArrivedUsWarehouse,
        ItemStatus::ShippedToIsrael,
        ItemStatus::CustomsIsrael,
        ItemStatus::ArrivedIsraelWarehouse,
        ItemStatus::ShippedToCustomer,
        ItemStatus::Delivered,
    ];

    /// Position in the forward pipeline; `None` for the parallel terminal
    /// state.
    pub fn pipeline_rank(&self) -> Option<u8> {
        match self {
            ItemStatus::Pending => Some(0),
            ItemStatus::Ordered => Some(1),
            ItemStatus::ArrivedUsWarehouse => Some(2),
            ItemStatus::ShippedToIsrael => Some(3),
            ItemStatus::CustomsIsrael => Some(4),
            ItemStatus::ArrivedIsraelWarehouse => Some(5),
            ItemStatus::ShippedToCustomer => Some(6),
            ItemStatus::Delivered => Some(7),
            ItemStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Delivered | ItemStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Ordered => "ORDERED",
            ItemStatus::ArrivedUsWarehouse => "ARRIVED_US_WAREHOUSE",
            ItemStatus::ShippedToIsrael => "SHIPPED_TO_ISRAEL",
            ItemStatus::CustomsIsrael => "CUSTOMS_ISRAEL",
            ItemStatus::ArrivedIsraelWarehouse => "ARRIVED_ISRAEL_WAREHOUSE",
            ItemStatus::ShippedToCustomer => "SHIPPED_TO_CUSTOMER",
            ItemStatus::Delivered => "DELIVERED",
            ItemStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::PIPELINE
            .iter()
            .copied()
            .chain(std::iter::once(ItemStatus::Cancelled))
            .find(|status| status.as_str() == s)
    }
}

/// Order-level status. Mirrors the item pipeline at the coarsest common
/// position, with `PaymentHold` as the payment-linked substate surfaced
/// while funds are authorized but items are still awaiting supplier
/// decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PaymentHold,
    Ordered,
    ArrivedUsWarehouse,
    ShippedToIsrael,
    CustomsIsrael,
    ArrivedIsraelWarehouse,
    ShippedToCustomer,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn from_item(status: ItemStatus) -> Self {
        match status {
            ItemStatus::Pending => OrderStatus::Pending,
            ItemStatus::Ordered => OrderStatus::Ordered,
            ItemStatus::ArrivedUsWarehouse => OrderStatus::ArrivedUsWarehouse,
            ItemStatus::ShippedToIsrael => OrderStatus::ShippedToIsrael,
            ItemStatus::CustomsIsrael => OrderStatus::CustomsIsrael,
            ItemStatus::ArrivedIsraelWarehouse => OrderStatus::ArrivedIsraelWarehouse,
            ItemStatus::ShippedToCustomer => OrderStatus::ShippedToCustomer,
            ItemStatus::Delivered => OrderStatus::Delivered,
            ItemStatus::Cancelled => OrderStatus::Cancelled,
        }
    }

    /// Pipeline rank of the item status this order status mirrors.
    pub fn pipeline_rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending | OrderStatus::PaymentHold => Some(0),
            OrderStatus::Ordered => Some(1),
            OrderStatus::ArrivedUsWarehouse => Some(2),
            OrderStatus::ShippedToIsrael => Some(3),
            OrderStatus::CustomsIsrael => Some(4),
            OrderStatus::ArrivedIsraelWarehouse => Some(5),
            OrderStatus::ShippedToCustomer => Some(6),
            OrderStatus::Delivered => Some(7),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::PaymentHold => "PAYMENT_HOLD",
            OrderStatus::Ordered => "ORDERED",
            OrderStatus::ArrivedUsWarehouse => "ARRIVED_US_WAREHOUSE",
            OrderStatus::ShippedToIsrael => "SHIPPED_TO_ISRAEL",
            OrderStatus::CustomsIsrael => "CUSTOMS_ISRAEL",
            OrderStatus::ArrivedIsraelWarehouse => "ARRIVED_ISRAEL_WAREHOUSE",
            OrderStatus::ShippedToCustomer => "SHIPPED_TO_CUSTOMER",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        [
            OrderStatus::Pending,
            OrderStatus::PaymentHold,
            OrderStatus::Ordered,
            OrderStatus::ArrivedUsWarehouse,
            OrderStatus::ShippedToIsrael,
            OrderStatus::CustomsIsrael,
            OrderStatus::ArrivedIsraelWarehouse,
            OrderStatus::ShippedToCustomer,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ]
        .iter()
        .copied()
        .find(|status| status.as_str() == s)
    }
}

/// Payment-intent lifecycle. Funds are authorized (`Hold`) at checkout and
/// captured only once every item's supplier-ordering decision is known.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Pending,
    Hold,
    ReadyToCharge,
    Charged,
    PartialRefund,
    FullRefund,
    Cancelled,
    Failed,
    RetryPending,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "PENDING",
            PaymentState::Hold => "HOLD",
            PaymentState::ReadyToCharge => "READY_TO_CHARGE",
            PaymentState::Charged => "CHARGED",
            PaymentState::PartialRefund => "PARTIAL_REFUND",
            PaymentState::FullRefund => "FULL_REFUND",
            PaymentState::Cancelled => "CANCELLED",
            PaymentState::Failed => "FAILED",
            PaymentState::RetryPending => "RETRY_PENDING",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub state: PaymentState,
    pub hold_agorot: i64,
    pub charged_agorot: i64,
    pub refunded_agorot: i64,
    pub authorization_ref: Option<String>,
    pub transaction_ref: Option<String>,
    pub last_error: Option<String>,
    /// Idempotency keys of monetary operations already applied. A retried
    /// key is a no-op.
    pub operation_refs: Vec<String>,
}

impl PaymentIntent {
    pub fn new() -> Self {
        Self {
            state: PaymentState::Pending,
            hold_agorot: 0,
            charged_agorot: 0,
            refunded_agorot: 0,
            authorization_ref: None,
            transaction_ref: None,
            last_error: None,
            operation_refs: Vec::new(),
        }
    }

    pub fn has_operation(&self, operation_ref: &str) -> bool {
        self.operation_refs.iter().any(|r| r == operation_ref)
    }

    pub fn record_operation(&mut self, operation_ref: &str) {
        self.operation_refs.push(operation_ref.to_string());
    }

    pub fn remaining_charge(&self) -> i64 {
        self.charged_agorot - self.refunded_agorot
    }
}

impl Default for PaymentIntent {
    fn default() -> Self {
        Self::new()
    }
}

/// Checkout pricing plus the adjusted figures recomputed after every item
/// mutation. Prices are tax-inclusive; `adjusted_tax_agorot` is the VAT
/// share of the adjusted subtotal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub subtotal_agorot: i64,
    pub shipping_agorot: i64,
    pub tax_agorot: i64,
    pub total_agorot: i64,
    pub adjusted_subtotal_agorot: i64,
    pub adjusted_tax_agorot: i64,
    pub adjusted_shipping_agorot: i64,
    pub adjusted_total_agorot: i64,
    pub meets_minimum: bool,
}

impl PricingSnapshot {
    pub fn zero() -> Self {
        Self {
            subtotal_agorot: 0,
            shipping_agorot: 0,
            tax_agorot: 0,
            total_agorot: 0,
            adjusted_subtotal_agorot: 0,
            adjusted_tax_agorot: 0,
            adjusted_shipping_agorot: 0,
            adjusted_total_agorot: 0,
            meets_minimum: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Masked<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VariantDetails {
    pub color: Option<String>,
    pub size: Option<String>,
    pub sku: Option<String>,
}

/// Details of a whole-item cancellation. Presence of this struct together
/// with `ItemStatus::Cancelled` is the single source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub refund_agorot: i64,
    pub cancelled_at: DateTime<Utc>,
}

/// Supplier-side order metadata recorded when an item is ordered upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierOrder {
    pub supplier_order_number: String,
    pub tracking_number: Option<String>,
    pub ordered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub from: ItemStatus,
    pub to: ItemStatus,
    pub notes: Option<String>,
    pub actor: String,
    pub at: DateTime<Utc>,
}

/// One line (product + variant + quantity) within an order. Owned
/// exclusively by its order; status moves through the pipeline
/// independently of sibling items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub supplier_name: String,
    pub price_agorot: i64,
    pub quantity: i32,
    pub status: ItemStatus,
    pub variant: VariantDetails,
    pub cancellation: Option<Cancellation>,
    pub supplier_order: Option<SupplierOrder>,
    pub audit: Vec<AuditEntry>,
}

impl OrderItem {
    pub fn new(
        product_id: Uuid,
        name: String,
        supplier_name: String,
        price_agorot: i64,
        quantity: i32,
        variant: VariantDetails,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            name,
            supplier_name,
            price_agorot,
            quantity,
            status: ItemStatus::Pending,
            variant,
            cancellation: None,
            supplier_order: None,
            audit: Vec::new(),
        }
    }

    pub fn line_total_agorot(&self) -> i64 {
        self.price_agorot * self.quantity as i64
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ItemStatus::Cancelled
    }

    pub fn is_active(&self) -> bool {
        !self.is_cancelled()
    }
}

/// Root aggregate. Never physically deleted; cancellations and payment
/// events mutate it in place under the per-order lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub ordered_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub customer_email: Masked<String>,
    pub shipping_address: Address,
    pub pricing: PricingSnapshot,
    pub payment: PaymentIntent,
    pub items: Vec<OrderItem>,
    /// Optimistic-concurrency marker; stale writes are rejected by the
    /// repository.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        order_number: String,
        customer_email: String,
        shipping_address: Address,
        items: Vec<OrderItem>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number,
            ordered_at: now,
            status: OrderStatus::Pending,
            customer_email: Masked(customer_email),
            shipping_address,
            pricing: PricingSnapshot::zero(),
            payment: PaymentIntent::new(),
            items,
            version: 0,
            updated_at: now,
        }
    }

    pub fn item(&self, item_id: Uuid) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: Uuid) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|i| i.id == item_id)
    }

    pub fn active_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|i| i.is_active())
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.status, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_statuses_serialize_screaming_snake() {
        let value = serde_json::to_value(ItemStatus::ArrivedUsWarehouse).unwrap();
        assert_eq!(value, serde_json::json!("ARRIVED_US_WAREHOUSE"));
        assert_eq!(
            ItemStatus::from_str("SHIPPED_TO_ISRAEL"),
            Some(ItemStatus::ShippedToIsrael)
        );
    }

    #[test]
    fn pipeline_ranks_are_strictly_increasing() {
        let ranks: Vec<u8> = ItemStatus::PIPELINE
            .iter()
            .map(|s| s.pipeline_rank().unwrap())
            .collect();
        for pair in ranks.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(ItemStatus::Cancelled.pipeline_rank(), None);
    }

    #[test]
    fn line_total_multiplies_quantity() {
        let item = OrderItem::new(
            Uuid::new_v4(),
            "Phone Case".to_string(),
            "us-gadget-depot".to_string(),
            10_000,
            2,
            VariantDetails::default(),
        );
        assert_eq!(item.line_total_agorot(), 20_000);
    }

    #[test]
    fn payment_operation_refs_deduplicate_retries() {
        let mut intent = PaymentIntent::new();
        assert!(!intent.has_operation("capture-1"));
        intent.record_operation("capture-1");
        assert!(intent.has_operation("capture-1"));
    }
}
