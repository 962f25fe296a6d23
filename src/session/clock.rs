/// Host playback position.
pub trait PlaybackClock {
    /// Current media time in seconds.
    fn current_time_secs(&self) -> f64;
}

impl<F: Fn() -> f64> PlaybackClock for F {
    fn current_time_secs(&self) -> f64 {
        self()
    }
}

/// A clock moved by hand. Used by the CLI and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ManualClock {
    secs: f64,
}

impl ManualClock {
    pub fn new(secs: f64) -> Self {
        Self { secs }
    }

    pub fn set(&mut self, secs: f64) {
        self.secs = secs;
    }

    pub fn advance(&mut self, secs: f64) {
        self.secs += secs;
    }
}

impl PlaybackClock for ManualClock {
    fn current_time_secs(&self) -> f64 {
        self.secs
    }
}
