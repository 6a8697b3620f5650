//! Frame timing

use std::time::Instant;

/// Frame clock driven once per pump/render cycle
pub struct FrameClock {
    started: Instant,
    last_frame: Instant,
    delta_time: f32,
    frame_count: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a new clock starting now
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_frame: now,
            delta_time: 0.0,
            frame_count: 0,
        }
    }

    /// Mark the end of a frame
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Seconds spent on the previous frame
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Number of completed frames
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since the clock was created
    pub fn average_fps(&self) -> f32 {
        let total = self.last_frame.duration_since(self.started).as_secs_f32();
        if total > 0.0 {
            self.frame_count as f32 / total
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.frame_count(), 0);

        clock.tick();
        clock.tick();

        assert_eq!(clock.frame_count(), 2);
        assert!(clock.delta_time() >= 0.0);
        assert!(clock.average_fps() >= 0.0);
    }
}
