use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of an admin cost/availability check against the supplier's
/// listing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckOutcome {
    Confirmed,
    PriceChanged,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostCheck {
    pub at: DateTime<Utc>,
    pub result: CheckOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    pub usd_cost_cents: i64,
    pub sell_price_agorot: i64,
    pub changed_at: DateTime<Utc>,
}

/// Availability and cost history for one product or variant. Cost history
/// is append-only; entries are superseded, never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub product_id: Uuid,
    pub variant_sku: Option<String>,
    pub available: bool,
    pub last_checked: Option<CostCheck>,
    pub cost_history: Vec<CostEntry>,
}

impl AvailabilityRecord {
    pub fn new(product_id: Uuid, variant_sku: Option<String>) -> Self {
        Self {
            product_id,
            variant_sku,
            available: true,
            last_checked: None,
            cost_history: Vec::new(),
        }
    }

    pub fn mark_unavailable(&mut self) {
        self.available = false;
        self.record_check(CheckOutcome::Unavailable);
    }

    pub fn mark_available(&mut self) {
        self.available = true;
        self.record_check(CheckOutcome::Confirmed);
    }

    pub fn record_check(&mut self, result: CheckOutcome) {
        self.last_checked = Some(CostCheck {
            at: Utc::now(),
            result,
        });
    }

    pub fn push_cost(&mut self, usd_cost_cents: i64, sell_price_agorot: i64) {
        self.cost_history.push(CostEntry {
            usd_cost_cents,
            sell_price_agorot,
            changed_at: Utc::now(),
        });
        self.record_check(CheckOutcome::PriceChanged);
    }

    pub fn current_cost(&self) -> Option<&CostEntry> {
        self.cost_history.last()
    }
}

/// In-memory availability index keyed by product id + optional variant SKU.
pub struct AvailabilityLedger {
    records: HashMap<(Uuid, Option<String>), AvailabilityRecord>,
}

impl AvailabilityLedger {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn get(&self, product_id: Uuid, variant_sku: Option<&str>) -> Option<&AvailabilityRecord> {
        self.records
            .get(&(product_id, variant_sku.map(str::to_string)))
    }

    /// Fetch-or-create the record for a product/variant.
    pub fn entry(
        &mut self,
        product_id: Uuid,
        variant_sku: Option<&str>,
    ) -> &mut AvailabilityRecord {
        self.records
            .entry((product_id, variant_sku.map(str::to_string)))
            .or_insert_with(|| AvailabilityRecord::new(product_id, variant_sku.map(str::to_string)))
    }

    pub fn put(&mut self, record: AvailabilityRecord) {
        self.records.insert(
            (record.product_id, record.variant_sku.clone()),
            record,
        );
    }
}

impl Default for AvailabilityLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_mark_records_check() {
        let mut ledger = AvailabilityLedger::new();
        let product_id = Uuid::new_v4();

        let record = ledger.entry(product_id, None);
        assert!(record.available);

        record.mark_unavailable();
        assert!(!record.available);
        assert_eq!(
            ledger.get(product_id, None).unwrap().last_checked.as_ref().unwrap().result,
            CheckOutcome::Unavailable
        );
    }

    #[test]
    fn cost_history_is_append_only() {
        let mut record = AvailabilityRecord::new(Uuid::new_v4(), Some("SKU-RED-M".to_string()));

        record.push_cost(4_000, 25_600);
        record.push_cost(4_500, 28_800);

        assert_eq!(record.cost_history.len(), 2);
        assert_eq!(record.current_cost().unwrap().usd_cost_cents, 4_500);
        assert_eq!(record.cost_history[0].usd_cost_cents, 4_000);
    }

    #[test]
    fn variant_records_are_independent_of_product_record() {
        let mut ledger = AvailabilityLedger::new();
        let product_id = Uuid::new_v4();

        ledger.entry(product_id, Some("SKU-A")).mark_unavailable();

        assert!(ledger.get(product_id, None).is_none());
        assert!(!ledger.get(product_id, Some("SKU-A")).unwrap().available);
    }
}
