//! Configuration loading tests.

use std::io::Write;

use cyclarb::config::{Config, PricingConfig, VenueConfig};
use rust_decimal_macros::dec;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const FULL_CONFIG: &str = r#"
[logging]
level = "debug"
format = "json"

[venues.alpha]
kind = "sim"

[[venues.alpha.markets]]
base = "BTC"
quote = "USDT"
bid = 60000.0
ask = 60100.0
volume = 10.0

[venues.alpha.balances]
BTC = 0.5

[venues.alpha.withdrawal_fees]
BTC = { fixed = 0.0005, fiat = 30.0 }

[fees]
default = 0.001

[fees.venues]
alpha = 0.0008

[assets]
fiat = ["USD"]
allowed = ["BTC", "USDT"]

[pricing]
kind = "static"

[pricing.prices]
BTC = 60000.0
USDT = 1.0

[detector]
max_cycle_len = 4
min_trade_notional = 25.0

[supervisor]
iteration_interval_secs = 5
withdrawal_refresh_every = 10
history_file = "history.jsonl"
"#;

#[test]
fn full_config_parses() {
    let file = write_config(FULL_CONFIG);
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.venues.len(), 1);
    let VenueConfig::Sim(sim) = &config.venues["alpha"];
    assert_eq!(sim.markets.len(), 1);
    assert_eq!(sim.markets[0].bid, dec!(60000));
    assert_eq!(sim.balances["BTC"], dec!(0.5));
    assert_eq!(sim.withdrawal_fees["BTC"].fiat, dec!(30));

    assert_eq!(config.fees.default, 0.001);
    assert_eq!(config.fees.venues["alpha"], 0.0008);

    assert_eq!(config.assets.fiat, vec!["USD"]);
    assert_eq!(config.assets.allowed, vec!["BTC", "USDT"]);

    let PricingConfig::Static { prices } = &config.pricing else {
        panic!("expected static pricing");
    };
    assert_eq!(prices["BTC"], dec!(60000));

    assert_eq!(config.detector.max_cycle_len, 4);
    assert_eq!(config.detector.min_trade_notional, 25.0);
    // Unset detector fields keep their defaults
    assert_eq!(config.detector.order_book_depth, 20);

    assert_eq!(config.supervisor.iteration_interval_secs, 5);
    assert_eq!(config.supervisor.withdrawal_refresh_every, 10);
    assert!(config.supervisor.history_file.is_some());
    // Unset supervisor fields keep their defaults
    assert_eq!(config.supervisor.stop_grace_secs, 60);

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
}

#[test]
fn minimal_config_fills_defaults() {
    let file = write_config(
        r#"
[venues.solo]
kind = "sim"
"#,
    );
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.fees.default, 0.002);
    assert_eq!(config.detector.max_cycle_len, 6);
    assert_eq!(config.supervisor.iteration_interval_secs, 20);
    assert!(matches!(
        config.pricing,
        PricingConfig::CoinMarketCap { .. }
    ));
    assert!(config.assets.fiat.contains(&"USD".to_string()));
}

#[test]
fn missing_venues_section_is_rejected() {
    let file = write_config(
        r#"
[logging]
level = "info"
"#,
    );
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn out_of_range_fee_is_rejected() {
    let file = write_config(
        r#"
[venues.solo]
kind = "sim"

[fees]
default = 1.5
"#,
    );
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn non_positive_trade_size_is_rejected() {
    let file = write_config(
        r#"
[venues.solo]
kind = "sim"

[detector]
inter_venue_trade_size = 0.0
"#,
    );
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn malformed_toml_is_rejected() {
    let file = write_config("this is not toml [");
    assert!(Config::load(file.path()).is_err());
}
