use std::{collections::VecDeque, time::Duration};

/// Per-frame budget at 60 Hz.
pub const DEFAULT_FRAME_BUDGET_MS: f64 = 1000.0 / 60.0;
/// Number of recent render samples kept for average/min/max.
pub const DEFAULT_STATS_WINDOW: usize = 60;

/// Point-in-time view of [`RenderStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct RenderStatsSnapshot {
    /// Renders performed since the session started (or since the last reset).
    pub frames_rendered: u64,
    /// Renders that took longer than the frame budget.
    pub frames_dropped: u64,
    /// Samples currently in the rolling window.
    pub samples: usize,
    pub average_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_ms: f64,
}

/// Rolling render-time statistics with frame-drop detection.
#[derive(Clone, Debug)]
pub struct RenderStats {
    budget_ms: f64,
    capacity: usize,
    window: VecDeque<f64>,
    frames_rendered: u64,
    frames_dropped: u64,
}

impl RenderStats {
    pub fn new(budget_ms: f64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            budget_ms,
            capacity,
            window: VecDeque::with_capacity(capacity),
            frames_rendered: 0,
            frames_dropped: 0,
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.record_ms(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn record_ms(&mut self, ms: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(ms);
        self.frames_rendered += 1;
        if ms > self.budget_ms {
            self.frames_dropped += 1;
        }
    }

    pub fn snapshot(&self) -> RenderStatsSnapshot {
        let samples = self.window.len();
        if samples == 0 {
            return RenderStatsSnapshot {
                frames_rendered: self.frames_rendered,
                frames_dropped: self.frames_dropped,
                ..RenderStatsSnapshot::default()
            };
        }
        let (sum, min, max) = self
            .window
            .iter()
            .fold((0.0, f64::INFINITY, f64::NEG_INFINITY), |(s, lo, hi), &v| {
                (s + v, lo.min(v), hi.max(v))
            });
        RenderStatsSnapshot {
            frames_rendered: self.frames_rendered,
            frames_dropped: self.frames_dropped,
            samples,
            average_ms: sum / samples as f64,
            min_ms: min,
            max_ms: max,
            last_ms: self.window.back().copied().unwrap_or_default(),
        }
    }

    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.frames_rendered = 0;
        self.frames_dropped = 0;
    }
}

impl Default for RenderStats {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_BUDGET_MS, DEFAULT_STATS_WINDOW)
    }
}
