mod loop_runner;
mod metrics;

pub use loop_runner::{run_headless, LoopConfig, LoopControl, LoopExit, LoopPacing, LoopReport};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
