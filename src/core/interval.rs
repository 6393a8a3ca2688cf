use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Local, TimeDelta};

use crate::core::hour::HourStamp;

/// Half-open local time interval.
#[must_use]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Interval {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl Debug for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

impl Interval {
    /// The interval of the given length that ends at `end`.
    pub fn trailing(end: DateTime<Local>, length: TimeDelta) -> Self {
        Self { start: end - length, end }
    }

    /// The whole hour, or [`None`] if the hour does not exist locally.
    #[must_use]
    pub fn of_hour(stamp: HourStamp) -> Option<Self> {
        let start = stamp.start()?;
        Some(Self { start, end: start + TimeDelta::hours(1) })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;

    #[test]
    fn of_hour_spans_one_hour() {
        let stamp = HourStamp::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), 13);
        let interval = Interval::of_hour(stamp).unwrap();
        assert_eq!(interval.start, Local.with_ymd_and_hms(2025, 6, 1, 13, 0, 0).unwrap());
        assert_eq!(interval.end, Local.with_ymd_and_hms(2025, 6, 1, 14, 0, 0).unwrap());
    }

    #[test]
    fn trailing_ends_at_given_time() {
        let end = Local.with_ymd_and_hms(2025, 6, 4, 0, 0, 0).unwrap();
        let interval = Interval::trailing(end, TimeDelta::days(3));
        assert_eq!(interval.start, Local.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(interval.end, end);
    }
}
