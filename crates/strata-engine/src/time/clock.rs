use std::time::{Duration, Instant};

/// Timing of one frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    /// Seconds since the clock was created.
    pub elapsed: f32,
    pub frame_index: u64,
}

/// Produces [`FrameTime`]s with a clamped delta.
///
/// The clamp keeps animation stable after stalls (debugger, minimized window).
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame_index: u64,
    max_dt: Duration,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

impl FrameClock {
    pub fn new(max_dt: Duration) -> Self {
        let now = Instant::now();
        Self { start: now, last: now, frame_index: 0, max_dt }
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now.saturating_duration_since(self.last).min(self.max_dt);
        self.last = now;

        let time = FrameTime {
            dt: dt.as_secs_f32(),
            elapsed: now.saturating_duration_since(self.start).as_secs_f32(),
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_clamped_and_frames_count_up() {
        let mut clock = FrameClock::new(Duration::from_millis(100));
        let base = clock.last;

        let first = clock.tick_at(base + Duration::from_millis(16));
        let second = clock.tick_at(base + Duration::from_secs(2));

        assert!((first.dt - 0.016).abs() < 1e-6);
        assert!((second.dt - 0.1).abs() < 1e-6);
        assert!((second.elapsed - 2.0).abs() < 1e-6);
        assert_eq!((first.frame_index, second.frame_index), (0, 1));
    }
}
