use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::models::TcoAssumptions;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub tco: TcoSettings,
    #[serde(default)]
    pub semantic: SemanticSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Shared tier; local-only caching when absent
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_l1_cache_size")]
    pub l1_cache_size: usize,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_promotion_ttl_secs")]
    pub promotion_ttl_secs: u64,
    #[serde(default = "default_shared_timeout_ms")]
    pub shared_timeout_ms: u64,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            l1_cache_size: default_l1_cache_size(),
            ttl_secs: default_ttl_secs(),
            promotion_ttl_secs: default_promotion_ttl_secs(),
            shared_timeout_ms: default_shared_timeout_ms(),
            namespace: default_namespace(),
        }
    }
}

fn default_l1_cache_size() -> usize { 1000 }
fn default_ttl_secs() -> u64 { 300 }
fn default_promotion_ttl_secs() -> u64 { 60 }
fn default_shared_timeout_ms() -> u64 { 250 }
fn default_namespace() -> String { "carmatch".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    /// Year vehicle ages are measured against; current year when unset
    #[serde(default)]
    pub reference_year: Option<i32>,
    #[serde(default = "default_fallback_score")]
    pub fallback_score: f64,
    /// Bonus (and maximum penalty) applied when a spending ceiling is known
    #[serde(default = "default_budget_fit_bonus")]
    pub budget_fit_bonus: f64,
    /// Share above `budget_max` still admitted by the pre-filter
    #[serde(default = "default_budget_tolerance")]
    pub budget_tolerance: f64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Heuristic weight rows by usage (`neutral` for profiles without one),
    /// dimension name to raw weight. Rows are renormalized on use.
    #[serde(default)]
    pub weight_tables: HashMap<String, HashMap<String, f64>>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            reference_year: None,
            fallback_score: default_fallback_score(),
            budget_fit_bonus: default_budget_fit_bonus(),
            budget_tolerance: default_budget_tolerance(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            weight_tables: HashMap::new(),
        }
    }
}

fn default_fallback_score() -> f64 { 0.5 }
fn default_budget_fit_bonus() -> f64 { 0.05 }
fn default_budget_tolerance() -> f64 { 0.10 }
fn default_limit() -> usize { 10 }
fn default_max_limit() -> usize { 100 }

#[derive(Debug, Clone, Deserialize)]
pub struct TcoSettings {
    #[serde(default = "default_down_payment_pct")]
    pub down_payment_pct: f64,
    #[serde(default = "default_term_months")]
    pub term_months: u32,
    #[serde(default = "default_monthly_rate")]
    pub monthly_rate: f64,
    #[serde(default = "default_monthly_distance_km")]
    pub monthly_distance_km: f64,
    #[serde(default = "default_fuel_price")]
    pub fuel_price: f64,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_aging_factor")]
    pub aging_factor: f64,
    /// Yearly maintenance base by category, e.g. `sedan = 2600.0`
    #[serde(default)]
    pub maintenance_base: HashMap<String, f64>,
    /// Yearly insurance rate (fraction of price) by category
    #[serde(default)]
    pub insurance_rates: HashMap<String, f64>,
    /// Yearly ownership tax rate (fraction of price) by region code
    #[serde(default)]
    pub region_tax_rates: HashMap<String, f64>,
}

impl Default for TcoSettings {
    fn default() -> Self {
        Self {
            down_payment_pct: default_down_payment_pct(),
            term_months: default_term_months(),
            monthly_rate: default_monthly_rate(),
            monthly_distance_km: default_monthly_distance_km(),
            fuel_price: default_fuel_price(),
            region: default_region(),
            aging_factor: default_aging_factor(),
            maintenance_base: HashMap::new(),
            insurance_rates: HashMap::new(),
            region_tax_rates: HashMap::new(),
        }
    }
}

impl TcoSettings {
    pub fn assumptions(&self) -> TcoAssumptions {
        TcoAssumptions {
            down_payment_pct: self.down_payment_pct,
            term_months: self.term_months,
            monthly_rate: self.monthly_rate,
            monthly_distance_km: self.monthly_distance_km,
            fuel_price: self.fuel_price,
            region: self.region.clone(),
        }
    }
}

fn default_down_payment_pct() -> f64 { 0.20 }
fn default_term_months() -> u32 { 60 }
fn default_monthly_rate() -> f64 { 0.0149 }
fn default_monthly_distance_km() -> f64 { 1000.0 }
fn default_fuel_price() -> f64 { 5.89 }
fn default_region() -> String { "SP".to_string() }
fn default_aging_factor() -> f64 { 0.08 }

#[derive(Debug, Clone, Deserialize)]
pub struct SemanticSettings {
    /// Weighting service endpoint; heuristic weights only when absent
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_semantic_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SemanticSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_ms: default_semantic_timeout_ms(),
        }
    }
}

fn default_semantic_timeout_ms() -> u64 { 800 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with CARMATCH_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., CARMATCH__CACHE__TTL_SECS -> cache.ttl_secs
            .add_source(
                Environment::with_prefix("CARMATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = apply_well_known_env(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("CARMATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        apply_well_known_env(settings)?.try_deserialize()
    }
}

/// Apply conventional, unprefixed variables (REDIS_URL, SEMANTIC_API_KEY)
/// on top of the layered configuration
fn apply_well_known_env(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(redis_url) = env::var("REDIS_URL") {
        builder = builder.set_override("cache.redis_url", redis_url)?;
    }
    if let Ok(api_key) = env::var("SEMANTIC_API_KEY") {
        builder = builder.set_override("semantic.api_key", api_key)?;
    }

    builder.build()
}
