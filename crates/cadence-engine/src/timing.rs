//! Tick timing.
//!
//! Provides the fixed-interval gate used for transition steps, and a frame
//! clock for hosts that drive the manager from their own loop.

use std::time::{Duration, Instant};

/// Maximum steps run for a single tick; the rest of a long frame is dropped.
const MAX_STEPS_PER_TICK: u32 = 10;

/// Fixed-interval gate.
///
/// Accumulates tick time only while armed. Disarming clears the accumulator
/// so an idle gate costs nothing and carries no stale time into the next
/// activation.
#[derive(Debug, Clone)]
pub struct StepTimer {
    /// Seconds between steps
    interval: f32,
    /// Accumulated time since the last step
    accumulator: f32,
    /// Whether time is being accumulated
    armed: bool,
}

impl StepTimer {
    /// Creates a disarmed gate.
    #[must_use]
    pub fn new(interval: f32) -> Self {
        Self {
            interval: interval.max(0.001),
            accumulator: 0.0,
            armed: false,
        }
    }

    /// Step interval in seconds.
    #[must_use]
    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Whether the gate is accumulating.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arms the gate so the first step fires on the next tick.
    pub fn arm(&mut self) {
        self.armed = true;
        self.accumulator = self.interval;
    }

    /// Disarms the gate.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.accumulator = 0.0;
    }

    /// Accumulate time and return the number of steps due.
    pub fn accumulate(&mut self, dt: f32) -> u32 {
        if !self.armed {
            return 0;
        }

        self.accumulator += dt.max(0.0);
        let mut count = 0;

        while self.accumulator >= self.interval && count < MAX_STEPS_PER_TICK {
            self.accumulator -= self.interval;
            count += 1;
        }

        // If we're still behind, drop the backlog
        if self.accumulator > self.interval * 2.0 {
            self.accumulator = 0.0;
        }

        count
    }
}

/// Frame clock for a host loop.
#[derive(Debug)]
pub struct FrameClock {
    /// Time budget per frame
    frame_budget: Duration,
    /// Time of last frame start
    last_frame: Instant,
    /// Maximum delta time handed to the manager
    max_dt: f32,
}

impl FrameClock {
    /// Create a clock targeting `target_fps`.
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        let target_fps = target_fps.max(1);
        Self {
            frame_budget: Duration::from_secs_f64(1.0 / f64::from(target_fps)),
            last_frame: Instant::now(),
            max_dt: 0.25,
        }
    }

    /// Delta time since the last call, clamped to 250ms.
    pub fn delta_time(&mut self) -> f32 {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;
        dt.min(self.max_dt)
    }

    /// Sleep for the remainder of the frame budget.
    pub fn sleep_remainder(&self) {
        let elapsed = self.last_frame.elapsed();
        if elapsed < self.frame_budget {
            std::thread::sleep(self.frame_budget - elapsed);
        }
    }
}
