use std::time::Duration;

use indicatif::{BinaryBytes, DecimalBytes, HumanDuration};

pub const INFINITY: &str = "\u{221e}";

/// Byte count in decimal (`kB`, `MB`) or binary (`KiB`, `MiB`) units
pub fn bytes(count: u64, binary: bool) -> String {
    if binary {
        BinaryBytes(count).to_string()
    } else {
        DecimalBytes(count).to_string()
    }
}

pub fn speed(per_second: f64, binary: bool) -> String {
    let per_second = if per_second.is_finite() { per_second.max(0.0) } else { 0.0 };
    bytes(per_second.round() as u64, binary) + "/s"
}

/// Human readable duration, `∞` for anything that can't be represented
pub fn duration(seconds: f64) -> String {
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) => HumanDuration(duration).to_string(),
        Err(_) => INFINITY.to_string(),
    }
}

/// Seconds left at the current speed, infinite when nothing moves
pub fn eta(remaining: f64, speed: f64) -> f64 {
    if speed > 0.0 && speed.is_finite() {
        remaining.max(0.0) / speed
    } else {
        f64::INFINITY
    }
}

/// Whole numbers without decimals, everything else with at most two
pub fn number(value: f64) -> String {
    if !value.is_finite() {
        return INFINITY.to_string();
    }
    if value.fract() == 0.0 {
        return format!("{value:.0}");
    }

    let fixed = format!("{value:.2}");
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes() {
        assert_eq!(bytes(512, false), "512 B");
        assert_eq!(bytes(1024, true), "1.00 KiB");
        assert_eq!(speed(f64::NAN, false), "0 B/s");
    }

    #[test]
    fn test_duration() {
        assert_eq!(duration(f64::INFINITY), INFINITY);
        assert_eq!(duration(-1.0), INFINITY);
        assert_eq!(duration(f64::NAN), INFINITY);
        assert!(!duration(12.0).is_empty());
    }

    #[test]
    fn test_eta() {
        assert_eq!(eta(100.0, 50.0), 2.0);
        assert!(eta(100.0, 0.0).is_infinite());
        assert_eq!(eta(-5.0, 10.0), 0.0);
    }

    #[test]
    fn test_number() {
        assert_eq!(number(30.0), "30");
        assert_eq!(number(33.333333), "33.33");
        assert_eq!(number(2.5), "2.5");
        assert_eq!(number(f64::INFINITY), INFINITY);
    }
}
