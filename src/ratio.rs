//! Splitting a total into integer slot capacities.
//!
//! Every allocation sums exactly to the requested total: parts are floored and whatever is
//! left over lands on the last slot.

use std::fmt;
use std::sync::Arc;

/// Function producing slot capacities for a given total
pub type Allocator = Arc<dyn Fn(u64) -> Vec<u64> + Send + Sync>;

/// How a bar's total is divided among its slots
#[derive(Clone, Default)]
pub enum SlotSpec {
    /// One slot holding the whole total
    #[default]
    Single,
    /// `n` slots of (almost) equal capacity
    Count(usize),
    /// Slots proportional to the given weights, which don't need to add up to anything
    Weights(Vec<f64>),
    /// Slots computed from the total
    Custom(Allocator),
}

impl SlotSpec {
    pub fn allocate(&self, total: u64) -> Vec<u64> {
        match self {
            SlotSpec::Single => vec![total],
            SlotSpec::Count(count) => split_even(total, *count),
            SlotSpec::Weights(weights) => pad_ratio(weights, total),
            SlotSpec::Custom(allocator) => fit(allocator(total), total),
        }
    }
}

impl fmt::Debug for SlotSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotSpec::Single => write!(f, "Single"),
            SlotSpec::Count(count) => f.debug_tuple("Count").field(count).finish(),
            SlotSpec::Weights(weights) => f.debug_tuple("Weights").field(weights).finish(),
            SlotSpec::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl From<usize> for SlotSpec {
    fn from(count: usize) -> Self {
        SlotSpec::Count(count)
    }
}

impl From<Vec<f64>> for SlotSpec {
    fn from(weights: Vec<f64>) -> Self {
        SlotSpec::Weights(weights)
    }
}

impl From<Vec<u64>> for SlotSpec {
    fn from(values: Vec<u64>) -> Self {
        SlotSpec::Weights(values.into_iter().map(|v| v as f64).collect())
    }
}

/// Slots of equal capacity, `count` of them
pub fn slots_by_count(count: usize) -> SlotSpec {
    SlotSpec::Custom(Arc::new(move |total| split_even(total, count)))
}

/// Slots sized by percentages of the total
pub fn slots_by_percentage(percentages: &[f64]) -> SlotSpec {
    let percentages = percentages.to_vec();
    SlotSpec::Custom(Arc::new(move |total| {
        percentages
            .iter()
            .map(|p| (p.max(0.0) / 100.0 * total as f64).floor() as u64)
            .collect()
    }))
}

/// Splits `total` into `count` parts, the remainder going to the last one
pub fn split_even(total: u64, count: usize) -> Vec<u64> {
    let count = count.max(1);
    let base = total / count as u64;
    let mut parts = vec![base; count];
    if let Some(last) = parts.last_mut() {
        *last += total - base * count as u64;
    }

    parts
}

/// Scales relative weights to integers summing exactly to `total`
pub fn pad_ratio(weights: &[f64], total: u64) -> Vec<u64> {
    let weights = weights
        .iter()
        .map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
        .collect::<Vec<_>>();
    let sum = weights.iter().sum::<f64>();
    if sum <= 0.0 {
        return vec![total];
    }

    let parts = weights
        .iter()
        .map(|w| (w * total as f64 / sum).floor() as u64)
        .collect();

    settle(parts, total)
}

/// Keeps integer parts that already add up, rescales anything else
pub fn fit(parts: Vec<u64>, total: u64) -> Vec<u64> {
    match parts.iter().sum::<u64>() {
        _ if parts.is_empty() => vec![total],
        sum if sum == total => parts,
        0 => vec![total],
        _ => {
            let weights = parts.iter().map(|p| *p as f64).collect::<Vec<_>>();
            pad_ratio(&weights, total)
        }
    }
}

fn settle(mut parts: Vec<u64>, total: u64) -> Vec<u64> {
    let allotted = parts.iter().sum::<u64>();
    if allotted <= total {
        if let Some(last) = parts.last_mut() {
            *last += total - allotted;
        }
    } else {
        // float noise can overshoot by a unit or two
        let mut excess = allotted - total;
        for part in parts.iter_mut().rev() {
            let cut = excess.min(*part);
            *part -= cut;
            excess -= cut;
            if excess == 0 {
                break;
            }
        }
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_even() {
        assert_eq!(split_even(100, 2), vec![50, 50]);
        assert_eq!(split_even(100, 3), vec![33, 33, 34]);
        assert_eq!(split_even(10, 0), vec![10]);
        assert_eq!(split_even(2, 4), vec![0, 0, 0, 2]);
    }

    #[test]
    fn test_pad_ratio() {
        assert_eq!(pad_ratio(&[50.0, 50.0], 100), vec![50, 50]);
        assert_eq!(pad_ratio(&[1.0, 1.0], 200), vec![100, 100]);
        assert_eq!(pad_ratio(&[20.0, 30.0], 100), vec![40, 60]);
        assert_eq!(pad_ratio(&[1.0, 1.0, 1.0], 10), vec![3, 3, 4]);
        assert_eq!(pad_ratio(&[], 10), vec![10]);
        assert_eq!(pad_ratio(&[0.0, f64::NAN], 10), vec![10]);
    }

    #[test]
    fn test_allocation_is_exact() {
        for total in [1, 7, 99, 100, 1023, 65_535 * 3] {
            for count in 1..12 {
                let parts = SlotSpec::Count(count).allocate(total);
                assert_eq!(parts.len(), count);
                assert_eq!(parts.iter().sum::<u64>(), total);

                let weights = (1..=count).map(|w| w as f64 * 1.7).collect::<Vec<_>>();
                let parts = SlotSpec::Weights(weights).allocate(total);
                assert_eq!(parts.iter().sum::<u64>(), total);
            }
        }
    }

    #[test]
    fn test_slots_by_count() {
        let parts = slots_by_count(3).allocate(100);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().sum::<u64>(), 100);
        assert!(parts.iter().all(|p| *p == 33 || *p == 34));
    }

    #[test]
    fn test_slots_by_percentage() {
        assert_eq!(slots_by_percentage(&[25.0, 75.0]).allocate(200), vec![50, 150]);

        // under 100% is read as relative weights
        let parts = slots_by_percentage(&[10.0, 30.0]).allocate(100);
        assert_eq!(parts, vec![25, 75]);
    }

    #[test]
    fn test_fit() {
        assert_eq!(fit(vec![30, 70], 100), vec![30, 70]);
        assert_eq!(fit(vec![1, 1], 9), vec![4, 5]);
        assert_eq!(fit(vec![], 9), vec![9]);
        assert_eq!(fit(vec![0, 0], 9), vec![9]);
    }
}
