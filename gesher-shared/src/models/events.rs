use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ItemStatusChangedEvent {
    pub order_id: Uuid,
    pub item_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub actor: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ItemCancelledEvent {
    pub order_id: Uuid,
    pub item_id: Uuid,
    pub reason: String,
    pub refund_agorot: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct RefundIssuedEvent {
    pub order_id: Uuid,
    pub amount_agorot: i64,
    pub remaining_agorot: i64,
    pub operation_ref: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AvailabilityChangedEvent {
    pub product_id: Uuid,
    pub variant_sku: Option<String>,
    pub available: bool,
    pub reason: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PriceChangedEvent {
    pub product_id: Uuid,
    pub previous_cost_usd_cents: i64,
    pub new_cost_usd_cents: i64,
    pub new_sell_price_agorot: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SupplierBatchCommittedEvent {
    pub supplier_name: String,
    pub total_ordered: u32,
    pub total_unavailable: u32,
    pub total_failed: u32,
    pub timestamp: i64,
}
