use std::time::{Duration, Instant};

pub struct Time {
    delta_seconds: f64,
    last_update: Instant,

    frames_this_second: u32,
    second_start: Instant,
}

impl Time {
    pub fn new() -> Time {
        Time {
            delta_seconds: 0.0,
            last_update: Instant::now(),
            frames_this_second: 0,
            second_start: Instant::now(),
        }
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta_seconds as f32
    }

    pub fn update(&mut self) {
        let delta_time = self.last_update.elapsed();
        self.last_update = Instant::now();

        self.delta_seconds = delta_time.as_secs_f64();
    }

    /// Counts a presented frame; returns the averaged fps once per second.
    pub fn count_frame(&mut self) -> Option<f32> {
        self.frames_this_second += 1;

        let elapsed = self.second_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames_this_second as f32 / elapsed.as_secs_f32();
            self.frames_this_second = 0;
            self.second_start = Instant::now();
            Some(fps)
        } else {
            None
        }
    }
}
