use std::{
    fmt::{Debug, Formatter},
    ops::Sub,
};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time range `[start, end)` in UTC.
pub type Interval<Tz = Utc> = RangeExclusive<DateTime<Tz>>;

#[must_use]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RangeExclusive<T: Copy> {
    /// Inclusive.
    pub start: T,

    /// Exclusive.
    pub end: T,
}

impl<T: Copy + Debug> Debug for RangeExclusive<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

impl<T: Copy> RangeExclusive<T> {
    pub const fn new(start: T, end: T) -> Self {
        Self { start, end }
    }

    pub const fn with_end(mut self, end: T) -> Self {
        self.end = end;
        self
    }
}

impl<T: Copy + Sub> RangeExclusive<T> {
    #[must_use]
    pub fn len(self) -> <T as Sub>::Output {
        self.end - self.start
    }
}

impl<T: Copy + PartialOrd> RangeExclusive<T> {
    #[must_use]
    pub fn contains(self, other: T) -> bool {
        (self.start <= other) && (other < self.end)
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.end <= self.start
    }
}

impl Interval {
    #[must_use]
    pub fn duration(self) -> TimeDelta {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let interval = RangeExclusive::new(1, 3);
        assert!(!interval.contains(0));
        assert!(interval.contains(1));
        assert!(interval.contains(2));
        assert!(!interval.contains(3));
    }

    #[test]
    fn test_duration() {
        let interval = Interval::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 23, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 2, 7, 0, 0).unwrap(),
        );
        assert_eq!(interval.duration(), TimeDelta::hours(8));
        assert!(!interval.is_empty());
        assert!(interval.with_end(interval.start).is_empty());
    }
}
