//! Application layer - run supervision and lifecycle.

mod sizing;
mod state;
mod supervisor;

pub use sizing::CycleSizer;
pub use state::{RunState, StatusSnapshot, SupervisorState};
pub use supervisor::{LoopSchedule, Supervisor};
