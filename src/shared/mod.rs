//! State shared between the planner and the avoidance worker.

pub mod lock;
mod memory;
pub mod seqlock;

pub use memory::{SharedMemory, SharedProperties};
