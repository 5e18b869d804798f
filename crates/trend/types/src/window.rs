//! Trend window arithmetic
//!
//! A trend window is the trailing, minute-aligned time range currently
//! considered live for a machine. It is recomputed from the machine clock on
//! every read and never cached.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Round a timestamp down to its whole-minute boundary.
pub fn floor_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at - Duration::seconds(i64::from(at.second())) - Duration::nanoseconds(i64::from(at.nanosecond()))
}

/// An inclusive, minute-aligned time range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendWindow {
    /// Oldest minute inside the window.
    pub from: DateTime<Utc>,

    /// Newest minute inside the window.
    pub to: DateTime<Utc>,
}

impl TrendWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Build the window of length `span` whose newest minute is `to`.
    ///
    /// `to` is floored to the minute; `from` lands `span − 1 minute` earlier
    /// so that the window holds exactly `span` minute slots inclusive.
    pub fn ending_at(to: DateTime<Utc>, span: Duration) -> Self {
        let to = floor_to_minute(to);
        Self {
            from: to - (span - Duration::minutes(1)),
            to,
        }
    }

    /// Whether `at` falls inside the window (inclusive on both ends).
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at <= self.to
    }

    /// Intersection with another range, or `None` when they do not overlap.
    pub fn overlap(&self, other: &TrendWindow) -> Option<TrendWindow> {
        let from = self.from.max(other.from);
        let to = self.to.min(other.to);
        if from > to {
            return None;
        }
        Some(TrendWindow { from, to })
    }

    /// Number of minute slots the window covers.
    pub fn minutes(&self) -> i64 {
        (self.to - self.from).num_minutes() + 1
    }
}

impl std::fmt::Display for TrendWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn floor_drops_seconds_and_nanos() {
        let ts = at(10, 30, 42) + Duration::nanoseconds(1234);
        assert_eq!(floor_to_minute(ts), at(10, 30, 0));
    }

    #[test]
    fn floor_is_identity_on_aligned_timestamps() {
        assert_eq!(floor_to_minute(at(10, 30, 0)), at(10, 30, 0));
    }

    #[test]
    fn ending_at_is_deterministic() {
        let span = Duration::hours(8);
        let w1 = TrendWindow::ending_at(at(10, 0, 17), span);
        let w2 = TrendWindow::ending_at(at(10, 0, 17), span);
        assert_eq!(w1, w2);
        assert_eq!(w1.to, at(10, 0, 0));
        assert_eq!(w1.from, at(2, 1, 0));
        assert_eq!(w1.minutes(), 480);
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let w = TrendWindow::new(at(2, 0, 0), at(10, 0, 0));
        assert!(w.contains(at(2, 0, 0)));
        assert!(w.contains(at(10, 0, 0)));
        assert!(!w.contains(at(1, 59, 0)));
        assert!(!w.contains(at(10, 1, 0)));
    }

    #[test]
    fn overlap_clamps_to_both_ranges() {
        let w = TrendWindow::new(at(2, 0, 0), at(10, 0, 0));
        let correction = TrendWindow::new(at(9, 0, 0), at(11, 0, 0));
        let clamped = w.overlap(&correction).unwrap();
        assert_eq!(clamped, TrendWindow::new(at(9, 0, 0), at(10, 0, 0)));
    }

    #[test]
    fn overlap_of_disjoint_ranges_is_none() {
        let w = TrendWindow::new(at(2, 0, 0), at(10, 0, 0));
        let past = TrendWindow::new(at(0, 0, 0), at(1, 0, 0));
        assert!(w.overlap(&past).is_none());
    }
}
