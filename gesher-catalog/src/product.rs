use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
}

/// Catalog entry sourced from an upstream supplier. `usd_cost_cents` is the
/// last confirmed supplier cost; `sell_price_agorot` is what the storefront
/// charges (recommended or manually overridden).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub supplier_name: String,
    pub usd_cost_cents: i64,
    pub sell_price_agorot: i64,
    pub is_active: bool,
    pub variants: Vec<ProductVariant>,
    pub metadata: serde_json::Value,
}

impl Product {
    pub fn new(
        name: String,
        supplier_name: String,
        usd_cost_cents: i64,
        sell_price_agorot: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            supplier_name,
            usd_cost_cents,
            sell_price_agorot,
            is_active: true,
            variants: Vec::new(),
            metadata: serde_json::json!({}),
        }
    }

    /// Apply a confirmed supplier cost change and the sell price derived
    /// from it.
    pub fn update_cost(&mut self, usd_cost_cents: i64, sell_price_agorot: i64) {
        self.usd_cost_cents = usd_cost_cents;
        self.sell_price_agorot = sell_price_agorot;
    }

    pub fn variant(&self, sku: &str) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.sku == sku)
    }
}
