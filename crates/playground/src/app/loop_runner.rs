use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::PlaygroundError;
use crate::interpreter::Interpreter;
use crate::session::Playground;

use super::metrics::{MetricsAccumulator, MetricsHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPacing {
    /// Sleep one fixed step per frame and feed measured wall-clock deltas.
    RealTime,
    /// Feed exactly one fixed step per frame without sleeping.
    Simulated,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Loop time after which the loop gives up.
    pub deadline: Option<Duration>,
    pub pacing: LoopPacing,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            deadline: None,
            pacing: LoopPacing::RealTime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Completed,
    DeadlineReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub ticks: u64,
    pub elapsed: Duration,
}

/// Drives `playground` with fixed-size ticks until `driver` asks to exit or
/// the deadline passes.
///
/// `driver` runs once per frame before any ticks, which is where a host
/// presses buttons. Errors that only end the current run are logged and the
/// loop continues; every other error aborts the loop.
pub fn run_headless<I, F>(
    playground: &mut Playground<I>,
    config: &LoopConfig,
    metrics_handle: &MetricsHandle,
    mut driver: F,
) -> Result<LoopReport, PlaygroundError>
where
    I: Interpreter,
    F: FnMut(&mut Playground<I>) -> Result<LoopControl, PlaygroundError>,
{
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        deadline_ms = config.deadline.map(|deadline| deadline.as_millis() as u64),
        pacing = ?config.pacing,
        "loop_config"
    );

    let start = Instant::now();
    let mut last_frame_instant = start;
    let mut accumulator = Duration::ZERO;
    let mut elapsed = Duration::ZERO;
    let mut ticks = 0u64;
    let mut metrics_accumulator =
        MetricsAccumulator::new(start, metrics_log_interval, playground.total_steps());

    loop {
        if driver(playground)? == LoopControl::Exit {
            info!(ticks, elapsed_ms = elapsed.as_millis() as u64, "loop_completed");
            return Ok(LoopReport {
                exit: LoopExit::Completed,
                ticks,
                elapsed,
            });
        }
        if config.deadline.is_some_and(|deadline| elapsed >= deadline) {
            warn!(ticks, elapsed_ms = elapsed.as_millis() as u64, "loop_deadline_reached");
            return Ok(LoopReport {
                exit: LoopExit::DeadlineReached,
                ticks,
                elapsed,
            });
        }

        let (raw_frame_dt, now) = match config.pacing {
            LoopPacing::RealTime => {
                thread::sleep(fixed_dt);
                let now = Instant::now();
                let frame_dt = now.saturating_duration_since(last_frame_instant);
                last_frame_instant = now;
                (frame_dt, now)
            }
            LoopPacing::Simulated => {
                let simulated = elapsed.saturating_add(fixed_dt);
                (fixed_dt, start.checked_add(simulated).unwrap_or(start))
            }
        };
        elapsed = elapsed.saturating_add(raw_frame_dt);

        let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);
        accumulator = accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if let Err(error) = playground.tick(fixed_dt) {
                if !error.is_run_scoped() {
                    return Err(error);
                }
                warn!(error = %error, "run_failed");
            }
            ticks = ticks.saturating_add(1);
            metrics_accumulator.record_tick();
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now, playground.total_steps())
        {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                steps_per_second = snapshot.steps_per_second,
                total_steps = snapshot.total_steps,
                level_id = playground.current_level_id().unwrap_or("-"),
                run_state = ?playground.run_state(),
                "loop_metrics"
            );
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
