//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file. The reference price API
//! credential is never read from the file; it comes from the
//! `CMC_API_KEY` environment variable (see [`crate::pricing`]).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};
use crate::model::DetectorParams;

/// Main application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Configured venues, keyed by venue identifier.
    #[serde(default)]
    pub venues: BTreeMap<String, VenueConfig>,
    #[serde(default)]
    pub fees: FeesConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Default detection parameters, overridable per run.
    #[serde(default)]
    pub detector: DetectorParams,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.venues.is_empty() {
            return Err(ConfigError::MissingField { field: "venues" }.into());
        }
        validate_fee("fees.default", self.fees.default)?;
        for (venue, fee) in &self.fees.venues {
            validate_fee("fees.venues", *fee).map_err(|_| ConfigError::InvalidValue {
                field: "fees.venues",
                reason: format!("fee for {venue} must be in [0, 1)"),
            })?;
        }
        if self.detector.inter_venue_trade_size <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "detector.inter_venue_trade_size",
                reason: "must be positive".into(),
            }
            .into());
        }
        if self.detector.min_trade_notional <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "detector.min_trade_notional",
                reason: "must be positive".into(),
            }
            .into());
        }
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

fn validate_fee(field: &'static str, fee: f64) -> Result<()> {
    if !(0.0..1.0).contains(&fee) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "proportional fee must be in [0, 1)".into(),
        }
        .into());
    }
    Ok(())
}

/// Per-venue configuration.
///
/// Only simulated venues are built into this crate; live gateway
/// implementations plug in through [`crate::venue::MarketDataGateway`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VenueConfig {
    Sim(SimVenueConfig),
}

/// A deterministic in-memory venue, used for dry runs and tests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimVenueConfig {
    /// Listed trading pairs with static quotes.
    #[serde(default)]
    pub markets: Vec<SimMarketConfig>,
    /// Free balances, keyed by asset symbol.
    #[serde(default)]
    pub balances: BTreeMap<String, Decimal>,
    /// Withdrawal fee quotes, keyed by asset symbol.
    #[serde(default)]
    pub withdrawal_fees: BTreeMap<String, SimWithdrawalFeeConfig>,
}

/// A static market quote for a simulated venue.
#[derive(Debug, Clone, Deserialize)]
pub struct SimMarketConfig {
    pub base: String,
    pub quote: String,
    pub bid: Decimal,
    pub ask: Decimal,
    /// 24h traded volume in base units.
    #[serde(default)]
    pub volume: Decimal,
}

/// A withdrawal fee quote for a simulated venue.
#[derive(Debug, Clone, Deserialize)]
pub struct SimWithdrawalFeeConfig {
    /// Fixed fee in asset units.
    pub fixed: Decimal,
    /// The same fee expressed in fiat.
    pub fiat: Decimal,
}

/// Proportional trading fees per venue with a default fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeesConfig {
    /// Fallback fee for venues without an explicit entry.
    pub default: f64,
    /// Per-venue overrides, keyed by venue identifier.
    pub venues: BTreeMap<String, f64>,
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            default: 0.002,
            venues: BTreeMap::new(),
        }
    }
}

/// Asset universe policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Symbols treated as fiat, excluded unless `include_fiat` is set.
    pub fiat: Vec<String>,
    /// Optional whitelist; empty means every listed asset is eligible.
    pub allowed: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            fiat: ["USD", "EUR", "GBP", "JPY", "KRW", "CAD", "AUD"]
                .map(String::from)
                .to_vec(),
            allowed: Vec::new(),
        }
    }
}

/// Reference price service selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PricingConfig {
    /// CoinMarketCap-compatible quote API. Credential from `CMC_API_KEY`.
    CoinMarketCap {
        #[serde(default = "default_pricing_endpoint")]
        endpoint: String,
        #[serde(default = "default_pricing_convert")]
        convert: String,
    },
    /// Fixed price table, for dry runs without network access.
    Static {
        #[serde(default)]
        prices: BTreeMap<String, Decimal>,
    },
}

fn default_pricing_endpoint() -> String {
    "https://pro-api.coinmarketcap.com".into()
}

fn default_pricing_convert() -> String {
    "USD".into()
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self::CoinMarketCap {
            endpoint: default_pricing_endpoint(),
            convert: default_pricing_convert(),
        }
    }
}

/// Run supervisor scheduling knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Pause between detection iterations.
    pub iteration_interval_secs: u64,
    /// How long `stop()` waits before force-terminating the worker.
    pub stop_grace_secs: u64,
    /// Withdrawal fee and reference price refresh cadence, in iterations.
    pub withdrawal_refresh_every: u32,
    /// Upper bound on any single venue call.
    pub request_timeout_secs: u64,
    /// Concurrency bound for per-venue fan-out fetches.
    pub fetch_workers: usize,
    /// Optional JSONL file receiving one line per detected opportunity.
    pub history_file: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            iteration_interval_secs: 20,
            stop_grace_secs: 60,
            withdrawal_refresh_every: 50,
            request_timeout_secs: 10,
            fetch_workers: 8,
            history_file: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}
