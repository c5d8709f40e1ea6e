use std::time::Duration;

use tracing::debug;

use crate::interpreter::{Interpreter, InterpreterFault, StepOutcome};
use crate::speed::{scale_by_speed, DEFAULT_SPEED};

pub const DEFAULT_BASE_STEP_DURATION: Duration = Duration::from_secs(3);
pub const MIN_BASE_STEP_DURATION: Duration = Duration::from_millis(10);
pub const MAX_BASE_STEP_DURATION: Duration = Duration::from_secs(1000);
pub const DEFAULT_MARKER_HIDE_FRACTION: f32 = 0.95;

/// What happened during one walker tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkerReport {
    pub step: Option<StepOutcome>,
    pub finished: bool,
    pub hide_marker: bool,
}

/// Tick-driven gate deciding when the interpreter may execute its next unit.
///
/// After every executed unit the walker sleeps for the current step
/// interval, accumulated across ticks. The interval is re-read every tick,
/// so a speed change while sleeping shortens or stretches the remaining wait.
#[derive(Debug, Clone)]
pub struct Walker {
    base_step_duration: Duration,
    speed: f32,
    step_interval: Duration,
    marker_hide_fraction: f32,
    enabled: bool,
    running: bool,
    user_paused: bool,
    sleeping: bool,
    sleep_timer: Duration,
    end_requested: bool,
    marker_visible: bool,
    steps_taken: u64,
    current_line: usize,
}

impl Default for Walker {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_STEP_DURATION, DEFAULT_SPEED)
    }
}

impl Walker {
    pub fn new(base_step_duration: Duration, speed: f32) -> Self {
        let base_step_duration = clamp_base_step_duration(base_step_duration);
        Self {
            base_step_duration,
            speed,
            step_interval: scale_by_speed(base_step_duration, speed),
            marker_hide_fraction: DEFAULT_MARKER_HIDE_FRACTION,
            enabled: false,
            running: false,
            user_paused: false,
            sleeping: false,
            sleep_timer: Duration::ZERO,
            end_requested: false,
            marker_visible: false,
            steps_taken: 0,
            current_line: 0,
        }
    }

    pub fn with_marker_hide_fraction(mut self, fraction: f32) -> Self {
        self.marker_hide_fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            DEFAULT_MARKER_HIDE_FRACTION
        };
        self
    }

    /// Loads the program and begins ticking from a fresh state.
    pub fn activate(
        &mut self,
        interpreter: &mut dyn Interpreter,
        code: &str,
    ) -> Result<(), InterpreterFault> {
        interpreter.load(code)?;

        self.enabled = true;
        self.running = true;
        self.user_paused = false;
        self.end_requested = false;
        self.sleeping = false;
        self.sleep_timer = Duration::ZERO;
        self.marker_visible = false;
        self.steps_taken = 0;
        self.current_line = 0;
        debug!(
            step_interval_ms = self.step_interval.as_millis() as u64,
            "walker_activated"
        );
        Ok(())
    }

    pub fn tick(
        &mut self,
        dt: Duration,
        interpreter: &mut dyn Interpreter,
    ) -> Result<WalkerReport, InterpreterFault> {
        let mut report = WalkerReport::default();
        if !self.enabled || self.user_paused {
            return Ok(report);
        }

        if self.running && !self.sleeping {
            if self.end_requested {
                self.enabled = false;
                self.running = false;
                report.finished = true;
                return Ok(report);
            }

            match interpreter.execute_one_unit() {
                Ok(StepOutcome::ReachedEnd) => {
                    self.end_requested = true;
                    report.step = Some(StepOutcome::ReachedEnd);
                }
                Ok(outcome) => {
                    self.sleeping = true;
                    self.steps_taken = self.steps_taken.saturating_add(1);
                    if let Some(line) = outcome.line() {
                        self.current_line = line;
                    }
                    self.marker_visible = true;
                    report.step = Some(outcome);
                }
                Err(fault) => {
                    self.sleeping = true;
                    self.enabled = false;
                    self.running = false;
                    return Err(fault);
                }
            }
        }

        report.hide_marker = self.run_sleep_timer(dt);
        Ok(report)
    }

    fn run_sleep_timer(&mut self, dt: Duration) -> bool {
        if !self.sleeping {
            return false;
        }

        self.sleep_timer = self.sleep_timer.saturating_add(dt);
        let hide_at = self.step_interval.mul_f32(self.marker_hide_fraction);
        if self.sleep_timer < hide_at {
            return false;
        }

        let hide_marker = std::mem::replace(&mut self.marker_visible, false);
        if self.sleep_timer >= self.step_interval {
            self.sleep_timer = Duration::ZERO;
            self.sleeping = false;
        }
        hide_marker
    }

    /// Honored on the next tick so an in-flight unit completes first.
    pub fn request_stop(&mut self) {
        self.end_requested = true;
    }

    /// Suspends stepping without user involvement, e.g. while an answer is graded.
    pub fn hold(&mut self) {
        self.running = false;
    }

    /// Resumes after [`Walker::hold`] with a full cooldown before the next unit.
    pub fn release(&mut self) {
        self.sleep_timer = Duration::ZERO;
        self.sleeping = true;
        self.running = true;
    }

    /// Returns `true` only when the paused state actually changed.
    pub fn set_user_paused(&mut self, paused: bool) -> bool {
        if self.user_paused == paused {
            return false;
        }
        self.user_paused = paused;
        true
    }

    /// Unconditional shutdown; emits nothing.
    pub fn hard_stop(&mut self) {
        self.user_paused = false;
        self.running = false;
        self.enabled = false;
        self.sleeping = false;
        self.sleep_timer = Duration::ZERO;
        self.end_requested = false;
        self.marker_visible = false;
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
        self.recompute_interval();
    }

    pub fn set_base_step_duration(&mut self, base: Duration) {
        self.base_step_duration = clamp_base_step_duration(base);
        self.recompute_interval();
    }

    fn recompute_interval(&mut self) {
        self.step_interval = scale_by_speed(self.base_step_duration, self.speed);
    }

    pub fn base_step_duration(&self) -> Duration {
        self.base_step_duration
    }

    pub fn step_interval(&self) -> Duration {
        self.step_interval
    }

    pub fn is_active(&self) -> bool {
        self.enabled
    }

    pub fn is_holding(&self) -> bool {
        self.enabled && !self.running
    }

    pub fn is_user_paused(&self) -> bool {
        self.user_paused
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    pub fn is_marker_visible(&self) -> bool {
        self.marker_visible
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    pub fn current_line(&self) -> usize {
        self.current_line
    }
}

fn clamp_base_step_duration(base: Duration) -> Duration {
    base.clamp(MIN_BASE_STEP_DURATION, MAX_BASE_STEP_DURATION)
}
