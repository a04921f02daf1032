use std::time::{Duration, Instant};

/// Frame timer driving time-based policies such as shadow map refresh intervals.
pub struct Timer {
    start_time: Instant,
    last_update: Instant,
    /// Time since last tick
    pub delta: Duration,
    /// Total elapsed time since creation
    pub elapsed: Duration,
    /// Total number of ticks
    pub frame_count: u64,
    fixed_step: Option<Duration>,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Creates a new timer starting from now.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_update: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
            fixed_step: None,
        }
    }

    /// Advances one frame. Called once per `begin`.
    ///
    /// Uses the fixed step when one is set, the wall clock otherwise.
    pub fn tick(&mut self) {
        let step = match self.fixed_step {
            Some(step) => step,
            None => Instant::now().saturating_duration_since(self.last_update),
        };
        self.delta = step;
        self.last_update += step;
        self.elapsed = self.last_update - self.start_time;
        self.frame_count += 1;
    }

    /// Makes every following tick advance by `step` instead of sampling the
    /// clock, for deterministic playback. `None` returns to the wall clock.
    pub fn set_fixed_step(&mut self, step: Option<Duration>) {
        self.fixed_step = step;
    }
}
