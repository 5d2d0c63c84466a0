//! Path computation toward the current pose order.

mod engine;
mod process;
mod visibility;

pub use engine::{AvoidanceEngine, AvoidanceStrategy, PathSolver};
pub use process::{
    spawn_avoidance, spawn_avoidance_with, AvoidanceLoop, AvoidancePath, AvoidanceReport,
    AvoidanceWorker, CycleOutcome, SkipReason,
};
pub use visibility::VisibilityRoadMap;

#[cfg(test)]
pub use engine::MockPathSolver;
