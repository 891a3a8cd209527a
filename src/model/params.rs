//! Detection parameters and typed override application.
//!
//! The configured defaults are immutable for the lifetime of the process;
//! each run works on a copy with caller overrides applied. Overrides are
//! validated field by field: a malformed value falls back to the default
//! with a logged warning, and unknown keys are reported but never fail the
//! call.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Simulated balances: venue identifier -> asset symbol -> amount.
pub type SimulatedBalances = HashMap<String, HashMap<String, Decimal>>;

/// Parameters of the opportunity graph model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Upper bound on the number of edges in a cycle.
    pub max_cycle_len: usize,
    /// Fixed balances to use instead of fetching from venues.
    pub simulated_balances: Option<SimulatedBalances>,
    /// Assumed fiat notional of one inter-venue transfer.
    pub inter_venue_trade_size: f64,
    /// Minimum fiat notional an edge must support to be tradable.
    pub min_trade_notional: f64,
    /// Order book levels sampled by the sizing stage.
    pub order_book_depth: usize,
    /// Keep fiat assets in the node universe.
    pub include_fiat: bool,
    /// Allow transfer edges between venues.
    pub allow_inter_venue: bool,
    /// Constrain cycles to start at a node with meaningful balance.
    pub consider_starting_balance: bool,
    /// Cap transfer capacity by the destination-side balance.
    pub consider_inter_venue_balance: bool,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            max_cycle_len: 6,
            simulated_balances: None,
            inter_venue_trade_size: 2000.0,
            min_trade_notional: 10.0,
            order_book_depth: 20,
            include_fiat: false,
            allow_inter_venue: true,
            consider_starting_balance: true,
            consider_inter_venue_balance: true,
        }
    }
}

impl DetectorParams {
    /// Apply caller overrides on top of these parameters.
    ///
    /// Every field is validated independently; one malformed value never
    /// poisons the rest of the override map.
    pub fn with_overrides(&self, overrides: &serde_json::Map<String, Value>) -> Self {
        let mut params = self.clone();

        for (key, value) in overrides {
            match key.as_str() {
                "max_cycle_len" => match value.as_u64().filter(|v| *v >= 1) {
                    Some(v) => params.max_cycle_len = v as usize,
                    None => warn_invalid(key, value, "integer >= 1"),
                },
                "simulated_balances" => {
                    if value.is_null() {
                        params.simulated_balances = None;
                    } else {
                        match serde_json::from_value::<SimulatedBalances>(value.clone()) {
                            Ok(balances) => params.simulated_balances = Some(balances),
                            Err(_) => warn_invalid(key, value, "map of venue -> asset -> amount"),
                        }
                    }
                }
                "inter_venue_trade_size" => match value.as_f64().filter(|v| *v > 0.0) {
                    Some(v) => params.inter_venue_trade_size = v,
                    None => warn_invalid(key, value, "positive number"),
                },
                "min_trade_notional" => match value.as_f64().filter(|v| *v > 0.0) {
                    Some(v) => params.min_trade_notional = v,
                    None => warn_invalid(key, value, "positive number"),
                },
                "order_book_depth" => match value.as_u64().filter(|v| *v >= 1) {
                    Some(v) => params.order_book_depth = v as usize,
                    None => warn_invalid(key, value, "integer >= 1"),
                },
                "include_fiat" => apply_bool(key, value, &mut params.include_fiat),
                "allow_inter_venue" => apply_bool(key, value, &mut params.allow_inter_venue),
                "consider_starting_balance" => {
                    apply_bool(key, value, &mut params.consider_starting_balance)
                }
                "consider_inter_venue_balance" => {
                    apply_bool(key, value, &mut params.consider_inter_venue_balance)
                }
                _ => warn!(key = %key, "Unknown parameter override ignored"),
            }
        }

        params
    }
}

fn apply_bool(key: &str, value: &Value, field: &mut bool) {
    match value.as_bool() {
        Some(v) => *field = v,
        None => warn_invalid(key, value, "boolean"),
    }
}

fn warn_invalid(key: &str, value: &Value, expected: &str) {
    warn!(
        key = %key,
        value = %value,
        expected = %expected,
        "Invalid parameter override; keeping default"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn overrides(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn defaults_are_sane() {
        let params = DetectorParams::default();
        assert_eq!(params.max_cycle_len, 6);
        assert!(params.inter_venue_trade_size > 0.0);
        assert!(params.min_trade_notional > 0.0);
        assert!(!params.include_fiat);
    }

    #[test]
    fn valid_overrides_apply() {
        let params = DetectorParams::default().with_overrides(&overrides(json!({
            "max_cycle_len": 4,
            "inter_venue_trade_size": 500.0,
            "include_fiat": true,
        })));

        assert_eq!(params.max_cycle_len, 4);
        assert_eq!(params.inter_venue_trade_size, 500.0);
        assert!(params.include_fiat);
        // Untouched fields keep their defaults
        assert_eq!(params.min_trade_notional, 10.0);
    }

    #[test]
    fn malformed_field_falls_back_while_others_apply() {
        let params = DetectorParams::default().with_overrides(&overrides(json!({
            "inter_venue_trade_size": "not-a-number",
            "order_book_depth": 50,
        })));

        assert_eq!(params.inter_venue_trade_size, 2000.0);
        assert_eq!(params.order_book_depth, 50);
    }

    #[test]
    fn non_positive_numbers_are_rejected() {
        let params = DetectorParams::default().with_overrides(&overrides(json!({
            "min_trade_notional": -5.0,
            "max_cycle_len": 0,
        })));

        assert_eq!(params.min_trade_notional, 10.0);
        assert_eq!(params.max_cycle_len, 6);
    }

    #[test]
    fn simulated_balances_parse_and_clear() {
        let set = DetectorParams::default().with_overrides(&overrides(json!({
            "simulated_balances": {"alpha": {"BTC": 1.5}},
        })));

        let balances = set.simulated_balances.as_ref().unwrap();
        assert_eq!(balances["alpha"]["BTC"], dec!(1.5));

        let cleared = set.with_overrides(&overrides(json!({
            "simulated_balances": null,
        })));
        assert!(cleared.simulated_balances.is_none());
    }

    #[test]
    fn malformed_simulated_balances_keep_default() {
        let params = DetectorParams::default().with_overrides(&overrides(json!({
            "simulated_balances": [1, 2, 3],
        })));
        assert!(params.simulated_balances.is_none());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let params = DetectorParams::default().with_overrides(&overrides(json!({
            "definitely_not_a_param": 42,
            "max_cycle_len": 3,
        })));
        assert_eq!(params.max_cycle_len, 3);
    }
}
