//! Frame statistics

use std::collections::VecDeque;

/// Rolling frame time statistics, fed by the application loop.
#[derive(Debug, Clone)]
pub struct FrameStats {
    /// Frame time history in milliseconds
    frame_times: VecDeque<f64>,
    max_samples: usize,
    fps: f64,
    avg_frame_time_ms: f64,
    min_frame_time_ms: f64,
    max_frame_time_ms: f64,
    total_frames: u64,
}

impl FrameStats {
    /// Create a tracker averaging over the last `max_samples` frames
    #[must_use]
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples,
            fps: 0.0,
            avg_frame_time_ms: 0.0,
            min_frame_time_ms: 0.0,
            max_frame_time_ms: 0.0,
            total_frames: 0,
        }
    }

    /// Record a frame that took `delta_ms` milliseconds
    pub fn record_frame(&mut self, delta_ms: f64) {
        self.total_frames += 1;

        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(delta_ms.max(0.0));

        self.update_stats();
    }

    fn update_stats(&mut self) {
        if self.frame_times.is_empty() {
            return;
        }

        let mut total = 0.0;
        let mut min = f64::MAX;
        let mut max = 0.0_f64;
        for &dt in &self.frame_times {
            total += dt;
            min = min.min(dt);
            max = max.max(dt);
        }

        let count = self.frame_times.len() as f64;
        if total > 0.0 {
            self.avg_frame_time_ms = total / count;
            self.fps = count / (total / 1000.0);
        } else {
            self.avg_frame_time_ms = 0.0;
            self.fps = 0.0;
        }
        self.min_frame_time_ms = min;
        self.max_frame_time_ms = max;
    }

    /// Clear the history, keeping the sample window
    pub fn reset(&mut self) {
        *self = Self::new(self.max_samples);
    }

    #[must_use]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    #[must_use]
    pub fn avg_frame_time_ms(&self) -> f64 {
        self.avg_frame_time_ms
    }

    #[must_use]
    pub fn min_frame_time_ms(&self) -> f64 {
        self.min_frame_time_ms
    }

    #[must_use]
    pub fn max_frame_time_ms(&self) -> f64 {
        self.max_frame_time_ms
    }

    /// Frames recorded since creation or the last reset
    #[must_use]
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// One line summary for logs
    #[must_use]
    pub fn format_stats(&self) -> String {
        format!(
            "FPS: {:.1} | Frame: {:.2}ms (min: {:.2}, max: {:.2})",
            self.fps, self.avg_frame_time_ms, self.min_frame_time_ms, self.max_frame_time_ms
        )
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(120)
    }
}
