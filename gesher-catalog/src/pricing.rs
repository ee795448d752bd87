use serde::{Deserialize, Serialize};

/// One cost band of the markup table. Supplier costs at or below
/// `max_usd_cents` take this band's multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTier {
    pub max_usd_cents: i64,
    pub multiplier: f64,
}

/// Three-band markup table. Costs above `tier2.max_usd_cents` fall through
/// to `tier3_multiplier`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub tier1: PriceTier,
    pub tier2: PriceTier,
    pub tier3_multiplier: f64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            tier1: PriceTier {
                max_usd_cents: 5_000,
                multiplier: 2.0,
            },
            tier2: PriceTier {
                max_usd_cents: 20_000,
                multiplier: 1.7,
            },
            tier3_multiplier: 1.5,
        }
    }
}

/// Output of a pricing run. `recommended_ils` is in whole shekels, the unit
/// sell prices are displayed and stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub sell_price_usd_cents: i64,
    pub recommended_ils: i64,
}

impl Recommendation {
    /// Sell price in agorot after applying an optional manual override.
    /// The recommendation itself is untouched so callers can return both.
    pub fn resolved_sell_price_agorot(&self, override_agorot: Option<i64>) -> i64 {
        override_agorot.unwrap_or(self.recommended_ils * 100)
    }
}

/// Derive a recommended sell price from a supplier cost. Pure function of
/// its inputs; the tier table and exchange rate come from configuration.
pub fn recommend(usd_cost_cents: i64, tiers: &TierConfig, usd_to_ils: f64) -> Recommendation {
    let multiplier = if usd_cost_cents <= tiers.tier1.max_usd_cents {
        tiers.tier1.multiplier
    } else if usd_cost_cents <= tiers.tier2.max_usd_cents {
        tiers.tier2.multiplier
    } else {
        tiers.tier3_multiplier
    };

    let sell_price_usd_cents = (usd_cost_cents as f64 * multiplier).round() as i64;
    let recommended_ils = (sell_price_usd_cents as f64 / 100.0 * usd_to_ils).round() as i64;

    Recommendation {
        sell_price_usd_cents,
        recommended_ils,
    }
}
