use std::time::Duration;

use crate::format;

/// Snapshot of a stage, taken on every tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    /// Share of `length` transferred, `0` while the length is unknown
    pub percentage: f64,
    pub transferred: u64,
    pub length: Option<u64>,
    pub remaining: Option<u64>,
    /// Seconds until `length` is reached at the stage's speed
    pub eta: f64,
    pub runtime: Duration,
    /// Bytes since the previous tick
    pub delta: u64,
    /// Bytes per second
    pub speed: f64,
}

impl Progress {
    pub fn new(transferred: u64, length: Option<u64>, delta: u64, runtime: Duration, speed: f64) -> Self {
        let remaining = length.map(|length| length.saturating_sub(transferred));
        let percentage = match length {
            Some(0) => 100.0,
            Some(length) => transferred as f64 / length as f64 * 100.0,
            None => 0.0,
        };
        let eta = match remaining {
            Some(remaining) => format::eta(remaining as f64, speed),
            None => f64::INFINITY,
        };

        Self {
            percentage,
            transferred,
            length,
            remaining,
            eta,
            runtime,
            delta,
            speed,
        }
    }
}
