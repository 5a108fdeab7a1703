/// One independently tracked portion of the bar
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Slot {
    pub max: u64,
    pub done: f64,
}

impl Slot {
    pub fn new(max: u64) -> Self {
        Self { max, done: 0.0 }
    }

    /// Share of `total` held by this slot, in percent
    pub fn level(&self, total: u64) -> f64 {
        match total {
            0 => 0.0,
            total => self.max as f64 / total as f64 * 100.0,
        }
    }

    /// Completion of this slot alone, a zero capacity slot is always done
    pub fn percentage(&self) -> f64 {
        match self.max {
            0 => 100.0,
            max => self.done / max as f64 * 100.0,
        }
    }

    pub fn remaining(&self) -> f64 {
        (self.max as f64 - self.done).max(0.0)
    }

    pub fn is_complete(&self) -> bool {
        self.done >= self.max as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot() {
        let slot = Slot { max: 50, done: 25.0 };

        assert_eq!(slot.level(200), 25.0);
        assert_eq!(slot.percentage(), 50.0);
        assert_eq!(slot.remaining(), 25.0);
        assert!(!slot.is_complete());
    }

    #[test]
    fn test_empty_slot() {
        let slot = Slot::new(0);

        assert_eq!(slot.percentage(), 100.0);
        assert!(slot.is_complete());
        assert_eq!(slot.level(0), 0.0);
    }
}
