/// Measures the duration of the previous frame

use std::time::{Duration, Instant};

pub struct FrameClock {
    frame_start: Instant,
    last_frame: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            frame_start: Instant::now(),
            last_frame: Duration::ZERO,
        }
    }

    /// Seconds the previous frame took (0 on the first frame)
    pub fn delta_seconds(&self) -> f32 {
        self.last_frame.as_secs_f32()
    }

    pub fn begin(&mut self) {
        self.frame_start = Instant::now();
    }

    /// Close the current frame and return its duration in seconds
    pub fn end(&mut self) -> f32 {
        self.last_frame = self.frame_start.elapsed();
        self.last_frame.as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
