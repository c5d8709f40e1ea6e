use std::time::Duration;

pub const DEFAULT_SPEED: f32 = 0.5;

/// Normalized, user-controlled playback speed in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedController {
    speed: f32,
}

impl Default for SpeedController {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}

impl SpeedController {
    pub fn new(initial: f32) -> Self {
        Self {
            speed: clamp_speed(initial).unwrap_or(DEFAULT_SPEED),
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Stores the clamped value. Returns the new speed only when it changed,
    /// so callers notify at most once per actual change. NaN is ignored.
    pub fn set_speed(&mut self, value: f32) -> Option<f32> {
        let clamped = clamp_speed(value)?;
        if clamped == self.speed {
            return None;
        }
        self.speed = clamped;
        Some(clamped)
    }

    pub fn scale(&self, base: Duration) -> Duration {
        scale_by_speed(base, self.speed)
    }
}

/// `base * (1 - speed)`: full base at speed 0, zero at speed 1.
pub fn scale_by_speed(base: Duration, speed: f32) -> Duration {
    let factor = 1.0 - f64::from(speed.clamp(0.0, 1.0));
    base.mul_f64(factor)
}

fn clamp_speed(value: f32) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        Some(value.clamp(0.0, 1.0))
    }
}
