use std::time::{Duration, Instant};

/// One opacity animation between two values, eased with the quadratic
/// in/out curve. Only one runs at a time; the controller decides when a
/// new one may start.
#[derive(Debug, Clone)]
pub struct Fade {
    from: f32,
    to: f32,
    started: Instant,
    duration: Duration,
}

impl Fade {
    pub fn new(from: f32, to: f32, duration: Duration) -> Self {
        Self {
            from,
            to,
            started: Instant::now(),
            duration,
        }
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn is_fade_out(&self) -> bool {
        self.to < self.from
    }

    pub fn value_at(&self, now: Instant) -> f32 {
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (now.saturating_duration_since(self.started).as_secs_f32()
                / self.duration.as_secs_f32())
            .clamp(0.0, 1.0)
        };
        self.from + (self.to - self.from) * ease_in_out_quad(progress)
    }

    pub fn finished_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.duration
    }
}

fn ease_in_out_quad(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}
