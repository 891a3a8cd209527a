//! Cyclarb - multi-venue arbitrage cycle detection.
//!
//! This crate continuously scans a set of independent trading venues for
//! multi-hop arbitrage cycles: sequences of conversions across and between
//! venues that return more of a starting asset than was spent after fees.
//!
//! # Architecture
//!
//! Detection is formulated as a mixed-integer program over a weighted
//! multigraph of (venue, asset) nodes:
//!
//! - **[`model`]** - the opportunity graph model: node universe,
//!   feasibility mask, per-iteration rate/fee/liquidity matrices, and the
//!   log-sum cycle-selection objective
//! - **[`domain::solver`]** - solver abstraction
//!   - `HighsSolver` - open-source HiGHS via good_lp
//! - **[`app`]** - the run supervisor: starts and stops the detection
//!   worker, tracks lifecycle state, and records opportunity history
//! - **[`venue`]** - venue gateway abstraction
//! - **[`pricing`]** - fiat reference price service
//! - **[`fetch`]** - bounded concurrent fan-out helpers
//!
//! # Modules
//!
//! - [`config`] - configuration loading from TOML files
//! - [`domain`] - venue-agnostic types: nodes, cycles, records
//! - [`error`] - error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cyclarb::app::Supervisor;
//! use cyclarb::config::Config;
//! use cyclarb::domain::solver::HighsSolver;
//! use cyclarb::{pricing, venue};
//!
//! # async fn run() -> cyclarb::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let gateways = venue::build_gateways(&config);
//! let prices = pricing::build_price_source(&config.pricing)?;
//!
//! let supervisor = Supervisor::new(gateways, prices, Arc::new(HighsSolver::new()), &config);
//! let status = supervisor.start(None).await;
//! println!("state: {}", status.state);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod model;
pub mod pricing;
pub mod venue;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
