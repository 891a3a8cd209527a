//! Sizing stage boundary.
//!
//! Turning a detected cycle into executable order sizes requires order
//! book depth and balance data; that optimizer lives outside this crate.
//! The supervisor only needs the outcome, to record it and derive the
//! corresponding sub-state.

use async_trait::async_trait;

use crate::domain::{CandidateCycle, SizingOutcome};
use crate::error::Result;

/// Determines how much of a detected cycle can actually be traded.
#[async_trait]
pub trait CycleSizer: Send + Sync {
    /// Sizer name for logging/config.
    fn name(&self) -> &'static str;

    /// Size the cycle, sampling order books to `depth` levels.
    async fn size(&self, cycle: &CandidateCycle, depth: usize) -> Result<SizingOutcome>;
}
