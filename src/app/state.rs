//! Shared run state.
//!
//! The worker task mutates this cell; the supervisor and the surrounding
//! application read it through status queries. There is exactly one writer
//! at a time, so plain RwLocks suffice.

use std::fmt;

use parking_lot::RwLock;
use serde::Serialize;

use crate::domain::OpportunityRecord;

/// Lifecycle state of a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Starting,
    Running,
    FoundOpportunity,
    RunningNoOpportunity,
    /// Sub-state of `FoundOpportunity`: sizing produced a workable
    /// solution and execution was simulated.
    ExecutedTradeSimulation,
    /// Sub-state of `FoundOpportunity`: sizing found no workable solution.
    OpportunityNoWorkableSolution,
    Stopping,
    Stopped,
    Error,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::FoundOpportunity => "found_opportunity",
            Self::RunningNoOpportunity => "running_no_opportunity",
            Self::ExecutedTradeSimulation => "executed_trade_simulation",
            Self::OpportunityNoWorkableSolution => "opportunity_no_workable_solution",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Snapshot returned by status queries.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_opportunity: Option<OpportunityRecord>,
    pub worker_alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// State cell shared between the supervisor and its worker task.
pub struct SupervisorState {
    state: RwLock<RunState>,
    error: RwLock<Option<String>>,
    last_opportunity: RwLock<Option<OpportunityRecord>>,
    history: RwLock<Vec<OpportunityRecord>>,
}

impl SupervisorState {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RunState::Idle),
            error: RwLock::new(None),
            last_opportunity: RwLock::new(None),
            history: RwLock::new(Vec::new()),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.read()
    }

    pub fn set_state(&self, state: RunState) {
        *self.state.write() = state;
    }

    pub fn error(&self) -> Option<String> {
        self.error.read().clone()
    }

    pub fn set_error(&self, message: impl Into<String>) {
        *self.error.write() = Some(message.into());
    }

    pub fn last_opportunity(&self) -> Option<OpportunityRecord> {
        self.last_opportunity.read().clone()
    }

    /// Record a detected opportunity: replaces the last-opportunity slot
    /// and appends to the in-memory history.
    pub fn record_opportunity(&self, record: OpportunityRecord) {
        *self.last_opportunity.write() = Some(record.clone());
        self.history.write().push(record);
    }

    /// The append-only opportunity history, oldest first.
    pub fn history(&self) -> Vec<OpportunityRecord> {
        self.history.read().clone()
    }

    /// Clear per-run state ahead of a new worker launch.
    pub fn reset_for_start(&self) {
        *self.error.write() = None;
        *self.last_opportunity.write() = None;
        *self.state.write() = RunState::Starting;
    }
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CandidateCycle, CycleEdge, EdgeKind, Node};

    fn record() -> OpportunityRecord {
        let node = |v: &str, a: &str| Node::new(v.into(), a.into());
        let cycle = CandidateCycle::new(
            vec![
                CycleEdge {
                    from: node("a", "BTC"),
                    to: node("a", "ETH"),
                    kind: EdgeKind::Trade,
                },
                CycleEdge {
                    from: node("a", "ETH"),
                    to: node("a", "BTC"),
                    kind: EdgeKind::Trade,
                },
            ],
            0.02,
        );
        OpportunityRecord::new(&cycle, None)
    }

    #[test]
    fn starts_idle_with_no_error() {
        let state = SupervisorState::new();
        assert_eq!(state.state(), RunState::Idle);
        assert!(state.error().is_none());
        assert!(state.last_opportunity().is_none());
        assert!(state.history().is_empty());
    }

    #[test]
    fn record_updates_last_and_history() {
        let state = SupervisorState::new();
        state.record_opportunity(record());
        state.record_opportunity(record());

        assert!(state.last_opportunity().is_some());
        assert_eq!(state.history().len(), 2);
    }

    #[test]
    fn reset_clears_error_and_last_but_keeps_history() {
        let state = SupervisorState::new();
        state.set_error("boom");
        state.record_opportunity(record());

        state.reset_for_start();

        assert_eq!(state.state(), RunState::Starting);
        assert!(state.error().is_none());
        assert!(state.last_opportunity().is_none());
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn run_state_displays_snake_case() {
        assert_eq!(RunState::RunningNoOpportunity.to_string(), "running_no_opportunity");
        assert_eq!(RunState::ExecutedTradeSimulation.to_string(), "executed_trade_simulation");
    }
}
