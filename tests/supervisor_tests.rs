//! Integration tests for the run supervisor lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal_macros::dec;
use serde_json::json;

use cyclarb::app::{LoopSchedule, RunState, StatusSnapshot, Supervisor};
use cyclarb::config::Config;
use cyclarb::domain::solver::HighsSolver;
use cyclarb::domain::{OpportunityRecord, SizingOutcome, VenueId};
use cyclarb::pricing::StaticPrices;
use cyclarb::testkit::sizing::StaticSizer;
use cyclarb::testkit::venue::ScriptedVenue;
use cyclarb::venue::MarketDataGateway;

fn venues(
    list: Vec<(&str, ScriptedVenue)>,
) -> HashMap<VenueId, Arc<dyn MarketDataGateway>> {
    list.into_iter()
        .map(|(name, venue)| {
            (
                VenueId::new(name),
                Arc::new(venue) as Arc<dyn MarketDataGateway>,
            )
        })
        .collect()
}

fn supervisor(list: Vec<(&str, ScriptedVenue)>, prices: StaticPrices) -> Supervisor {
    let config = Config::default();
    Supervisor::new(
        venues(list),
        Arc::new(prices),
        Arc::new(HighsSolver::new()),
        &config,
    )
    .with_schedule(LoopSchedule {
        iteration_interval: Duration::from_millis(50),
        stop_grace: Duration::from_secs(5),
    })
}

/// A venue whose quotes never admit a profitable cycle.
fn quiet_venue() -> ScriptedVenue {
    ScriptedVenue::new("quiet")
        .with_market("AAA", "BBB", dec!(1.0), dec!(1.001), dec!(1000))
        .with_balance("AAA", dec!(10))
}

fn quiet_prices() -> StaticPrices {
    StaticPrices::from_prices([("AAA", dec!(100)), ("BBB", dec!(100))])
}

/// Two venues with a cross-venue spread wide enough to arbitrage.
fn spread_venues() -> Vec<(&'static str, ScriptedVenue)> {
    let v1 = ScriptedVenue::new("v1")
        .with_market("AAA", "BBB", dec!(1.2), dec!(1.21), dec!(10000))
        .with_balance("AAA", dec!(10))
        .with_withdrawal_fee("AAA", dec!(0.001), dec!(1))
        .with_withdrawal_fee("BBB", dec!(0.001), dec!(1));
    let v2 = ScriptedVenue::new("v2")
        .with_market("AAA", "BBB", dec!(1.0), dec!(1.01), dec!(10000))
        .with_balance("BBB", dec!(1000))
        .with_withdrawal_fee("AAA", dec!(0.001), dec!(1))
        .with_withdrawal_fee("BBB", dec!(0.001), dec!(1));
    vec![("v1", v1), ("v2", v2)]
}

fn spread_prices() -> StaticPrices {
    StaticPrices::from_prices([("AAA", dec!(100)), ("BBB", dec!(100))])
}

async fn wait_for(
    supervisor: &Supervisor,
    timeout: Duration,
    pred: impl Fn(&StatusSnapshot) -> bool,
) -> StatusSnapshot {
    let deadline = Instant::now() + timeout;
    loop {
        let status = supervisor.status();
        if pred(&status) || Instant::now() >= deadline {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn stop_before_start_is_a_noop() {
    let supervisor = supervisor(vec![("quiet", quiet_venue())], quiet_prices());

    let status = supervisor.stop().await;

    assert_eq!(status.state, RunState::Idle);
    assert!(!status.worker_alive);
    assert!(status.error.is_none());
}

#[tokio::test]
async fn start_is_rejected_while_worker_is_alive() {
    let supervisor = supervisor(vec![("quiet", quiet_venue())], quiet_prices());

    supervisor.start(None).await;
    let running = wait_for(&supervisor, Duration::from_secs(15), |s| {
        s.state == RunState::RunningNoOpportunity
    })
    .await;
    assert_eq!(running.state, RunState::RunningNoOpportunity);

    // The second start must not relaunch or reset state to `starting`;
    // it returns the current status instead.
    let rejected = supervisor.start(None).await;
    assert!(rejected.worker_alive);
    assert_eq!(rejected.state, RunState::RunningNoOpportunity);

    supervisor.stop().await;
}

#[tokio::test]
async fn stop_terminates_worker_and_reports_stopped() {
    let supervisor = supervisor(vec![("quiet", quiet_venue())], quiet_prices());

    let started = supervisor.start(None).await;
    assert!(started.worker_alive);

    let stopped = supervisor.stop().await;

    assert_eq!(stopped.state, RunState::Stopped);
    assert!(!stopped.worker_alive);
    assert!(stopped.pid.is_none());
    assert!(!supervisor.status().worker_alive);
}

#[tokio::test]
async fn restart_after_stop_works() {
    let supervisor = supervisor(vec![("quiet", quiet_venue())], quiet_prices());

    supervisor.start(None).await;
    supervisor.stop().await;

    let restarted = supervisor.start(None).await;
    assert!(restarted.worker_alive);

    supervisor.stop().await;
}

#[tokio::test]
async fn all_venues_down_ends_in_error_state() {
    let bad = ScriptedVenue::new("bad").failing_markets();
    let supervisor = supervisor(vec![("bad", bad)], quiet_prices());

    supervisor.start(None).await;
    let status = wait_for(&supervisor, Duration::from_secs(15), |s| {
        s.state == RunState::Error
    })
    .await;

    assert_eq!(status.state, RunState::Error);
    assert!(status.error.is_some());
}

#[tokio::test]
async fn detected_opportunity_reaches_executed_simulation_state() {
    let supervisor = supervisor(spread_venues(), spread_prices())
        .with_sizer(Arc::new(StaticSizer::workable(42.0)));

    supervisor.start(None).await;
    let status = wait_for(&supervisor, Duration::from_secs(30), |s| {
        s.state == RunState::ExecutedTradeSimulation
    })
    .await;

    assert_eq!(status.state, RunState::ExecutedTradeSimulation);
    let record = status.last_opportunity.expect("last opportunity recorded");
    assert!(record.profit_factor > 0.0);
    assert!(matches!(
        record.sizing,
        Some(SizingOutcome::SimulatedExecution { .. })
    ));
    assert!(!supervisor.history().is_empty());

    supervisor.stop().await;
}

#[tokio::test]
async fn unworkable_sizing_reaches_no_workable_solution_state() {
    let supervisor = supervisor(spread_venues(), spread_prices())
        .with_sizer(Arc::new(StaticSizer::unworkable()));

    supervisor.start(None).await;
    let status = wait_for(&supervisor, Duration::from_secs(30), |s| {
        s.state == RunState::OpportunityNoWorkableSolution
    })
    .await;

    assert_eq!(status.state, RunState::OpportunityNoWorkableSolution);
    let record = status.last_opportunity.expect("last opportunity recorded");
    assert_eq!(record.sizing, Some(SizingOutcome::NoWorkableSolution));

    supervisor.stop().await;
}

#[tokio::test]
async fn history_file_receives_one_json_line_per_opportunity() {
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("history.jsonl");

    let mut config = Config::default();
    config.supervisor.history_file = Some(history_path.clone());

    let supervisor = Supervisor::new(
        venues(spread_venues()),
        Arc::new(spread_prices()),
        Arc::new(HighsSolver::new()),
        &config,
    )
    .with_schedule(LoopSchedule {
        iteration_interval: Duration::from_millis(50),
        stop_grace: Duration::from_secs(5),
    });

    supervisor.start(None).await;
    wait_for(&supervisor, Duration::from_secs(30), |s| {
        s.last_opportunity.is_some()
    })
    .await;
    supervisor.stop().await;

    let contents = std::fs::read_to_string(&history_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert!(!lines.is_empty());
    for line in lines {
        let record: OpportunityRecord = serde_json::from_str(line).unwrap();
        assert!(record.profit_factor > 0.0);
        assert!(!record.walk.is_empty());
    }
}

#[tokio::test]
async fn set_parameters_validates_each_field_independently() {
    let supervisor = supervisor(vec![("quiet", quiet_venue())], quiet_prices());

    let overrides = json!({
        "max_cycle_len": 3,
        "inter_venue_trade_size": "garbage",
        "allow_inter_venue": false,
    });
    let params = supervisor.set_parameters(overrides.as_object().unwrap());

    assert_eq!(params.max_cycle_len, 3);
    assert!(!params.allow_inter_venue);
    // Malformed field falls back to the configured default
    assert_eq!(params.inter_venue_trade_size, 2000.0);
}

#[tokio::test]
async fn start_accepts_overrides_for_the_run() {
    let supervisor = supervisor(spread_venues(), spread_prices());

    // Disabling inter-venue trading removes every transfer edge, so the
    // cross-venue spread can no longer be closed into a cycle.
    let overrides = json!({ "allow_inter_venue": false });
    supervisor.start(Some(overrides.as_object().unwrap())).await;

    let status = wait_for(&supervisor, Duration::from_secs(15), |s| {
        s.state == RunState::RunningNoOpportunity
    })
    .await;
    assert_eq!(status.state, RunState::RunningNoOpportunity);
    assert!(status.last_opportunity.is_none());

    supervisor.stop().await;
}
