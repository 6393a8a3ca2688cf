use std::fmt::{Display, Formatter};

use chrono::{DateTime, Days, Local, NaiveDate, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

/// Local calendar hour: a date plus an hour of day in `0..24`.
///
/// Ordered chronologically, so it can key a sorted forecast map.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct HourStamp {
    pub date: NaiveDate,
    pub hour: u32,
}

impl HourStamp {
    #[must_use]
    pub fn new(date: NaiveDate, hour: u32) -> Self {
        debug_assert!(hour < 24, "hour of day out of range: {hour}");
        Self { date, hour }
    }

    /// Following hour, rolling over to the next day after 23:00.
    #[must_use]
    pub fn next(self) -> Self {
        if self.hour < 23 {
            Self { hour: self.hour + 1, ..self }
        } else {
            self.date
                .checked_add_days(Days::new(1))
                .map_or(self, |date| Self { date, hour: 0 })
        }
    }

    /// Preceding hour, rolling back to the previous day before 01:00.
    #[must_use]
    pub fn previous(self) -> Self {
        if self.hour > 0 {
            Self { hour: self.hour - 1, ..self }
        } else {
            self.date
                .checked_sub_days(Days::new(1))
                .map_or(self, |date| Self { date, hour: 23 })
        }
    }

    /// Infinite chronological sequence starting with this very hour.
    pub fn iter_forward(self) -> impl Iterator<Item = Self> {
        std::iter::successors(Some(self), |stamp| Some(stamp.next()))
    }

    /// Start of the hour in the local timezone.
    ///
    /// Returns [`None`] for an hour skipped by a daylight saving transition.
    #[must_use]
    pub fn start(self) -> Option<DateTime<Local>> {
        let naive = self.date.and_hms_opt(self.hour, 0, 0)?;
        Local.from_local_datetime(&naive).earliest()
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for HourStamp {
    fn from(timestamp: DateTime<Tz>) -> Self {
        let local = timestamp.with_timezone(&Local);
        Self { date: local.date_naive(), hour: local.hour() }
    }
}

impl Display for HourStamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:02}:00", self.date, self.hour)
    }
}
