//! Canned sizing stage for tests.

use async_trait::async_trait;

use crate::app::CycleSizer;
use crate::domain::{CandidateCycle, SizingOutcome};
use crate::error::Result;

/// A sizer that always returns the same outcome.
pub struct StaticSizer {
    outcome: SizingOutcome,
}

impl StaticSizer {
    /// Always reports a workable, simulated execution.
    pub fn workable(estimated_profit_fiat: f64) -> Self {
        Self {
            outcome: SizingOutcome::SimulatedExecution {
                estimated_profit_fiat,
            },
        }
    }

    /// Always reports that no workable solution exists.
    pub fn unworkable() -> Self {
        Self {
            outcome: SizingOutcome::NoWorkableSolution,
        }
    }
}

#[async_trait]
impl CycleSizer for StaticSizer {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn size(&self, _cycle: &CandidateCycle, _depth: usize) -> Result<SizingOutcome> {
        Ok(self.outcome.clone())
    }
}
