use gesher_catalog::pricing::{PriceTier, TierConfig};
use gesher_order::aggregate::CheckoutRules;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub checkout: CheckoutConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

/// Order-level pricing rules. Injected into the aggregate as an explicit
/// struct, never read as ambient state.
#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutConfig {
    pub tax_rate: f64,
    pub base_shipping_agorot: i64,
    #[serde(default = "default_free_shipping")]
    pub free_shipping_enabled: bool,
    pub free_shipping_threshold_agorot: i64,
    #[serde(default)]
    pub minimum_subtotal_agorot: i64,
    #[serde(default)]
    pub minimum_items: u32,
}

fn default_free_shipping() -> bool {
    true
}

impl CheckoutConfig {
    pub fn rules(&self) -> CheckoutRules {
        CheckoutRules {
            tax_rate: self.tax_rate,
            base_shipping_agorot: self.base_shipping_agorot,
            free_shipping_enabled: self.free_shipping_enabled,
            free_shipping_threshold_agorot: self.free_shipping_threshold_agorot,
            minimum_subtotal_agorot: self.minimum_subtotal_agorot,
            minimum_items: self.minimum_items,
        }
    }
}

/// Markup tiers and the USD→ILS rate used for sell-price recommendations.
#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    pub usd_to_ils: f64,
    pub tier1_max_usd_cents: i64,
    pub tier1_multiplier: f64,
    pub tier2_max_usd_cents: i64,
    pub tier2_multiplier: f64,
    pub tier3_multiplier: f64,
}

impl PricingConfig {
    pub fn tiers(&self) -> TierConfig {
        TierConfig {
            tier1: PriceTier {
                max_usd_cents: self.tier1_max_usd_cents,
                multiplier: self.tier1_multiplier,
            },
            tier2: PriceTier {
                max_usd_cents: self.tier2_max_usd_cents,
                multiplier: self.tier2_multiplier,
            },
            tier3_multiplier: self.tier3_multiplier,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Base configuration, always present
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Machine-local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables win, e.g. GESHER__SERVER__PORT=8080
            .add_source(config::Environment::with_prefix("GESHER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
