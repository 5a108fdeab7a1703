use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Throughput over a sliding time window
#[derive(Debug, Clone)]
pub struct Speedometer {
    window: Duration,
    started: Instant,
    samples: VecDeque<(Instant, u64)>,
}

impl Default for Speedometer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Speedometer {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, started: Instant) -> Self {
        Self {
            window,
            started,
            samples: VecDeque::new(),
        }
    }

    /// Records `bytes` and returns the current bytes per second
    pub fn push(&mut self, bytes: u64) -> f64 {
        self.push_at(Instant::now(), bytes)
    }

    pub fn push_at(&mut self, now: Instant, bytes: u64) -> f64 {
        if bytes > 0 {
            self.samples.push_back((now, bytes));
        }
        if let Some(horizon) = now.checked_sub(self.window) {
            while self.samples.front().is_some_and(|(at, _)| *at < horizon) {
                self.samples.pop_front();
            }
        }

        let sum = self.samples.iter().map(|(_, bytes)| *bytes).sum::<u64>();
        // a partial first second counts as a full one, no start-up spikes
        let elapsed = now
            .saturating_duration_since(self.started)
            .min(self.window)
            .as_secs_f64()
            .max(1.0);

        sum as f64 / elapsed
    }
}
