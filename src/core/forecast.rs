use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    core::hour::HourStamp,
    quantity::energy::{KilowattHours, WattHours},
};

/// Percentile of the solar production distribution, `0..=100`.
///
/// The feed publishes the 10th, 50th and 90th ones, everything else is interpolated.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::FromStr,
)]
pub struct Percentile(pub u8);

impl Default for Percentile {
    fn default() -> Self {
        Self(15)
    }
}

/// Hourly production estimate at the three published percentiles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 10th percentile.
    pub low: KilowattHours,

    /// 50th percentile.
    pub mid: KilowattHours,

    /// 90th percentile.
    pub high: KilowattHours,
}

/// Production estimate at the chosen percentile together with the clarity of the hour.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TargetEstimate {
    pub estimate: KilowattHours,

    /// Median to 90th percentile ratio within `0.0..=1.0`: `1.0` means a perfectly sunny hour.
    pub clarity: f64,
}

impl TargetEstimate {
    #[must_use]
    pub fn energy(self) -> WattHours {
        self.estimate.into()
    }
}

impl ForecastPoint {
    /// Piecewise-linear interpolation through (10, low), (50, mid) and (90, high).
    ///
    /// Percentiles outside `10..=90` extrapolate the adjacent segment.
    /// Production cannot be negative, so the result is clamped at zero.
    #[must_use]
    pub fn interpolate(&self, percentile: Percentile) -> KilowattHours {
        let percentile = f64::from(percentile.0);
        let estimate = if percentile <= 50.0 {
            self.low + (self.mid - self.low) * ((percentile - 10.0) / 40.0)
        } else {
            self.mid + (self.high - self.mid) * ((percentile - 50.0) / 40.0)
        };
        estimate.max(KilowattHours::ZERO)
    }

    #[must_use]
    pub fn clarity(&self) -> f64 {
        if self.high > KilowattHours::ZERO { (self.mid / self.high).clamp(0.0, 1.0) } else { 0.0 }
    }

    #[must_use]
    pub fn target(&self, percentile: Percentile) -> TargetEstimate {
        TargetEstimate { estimate: self.interpolate(percentile), clarity: self.clarity() }
    }
}

/// Single period row as published by the feed, in its native resolution.
#[derive(Copy, Clone, Debug)]
pub struct ForecastRow {
    pub period_end: DateTime<Utc>,
    pub point: ForecastPoint,
}

/// Hourly solar forecast keyed by local hour.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Forecast(BTreeMap<HourStamp, ForecastPoint>);

impl FromIterator<(HourStamp, ForecastPoint)> for Forecast {
    fn from_iter<T: IntoIterator<Item = (HourStamp, ForecastPoint)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Forecast {
    /// Buckets feed rows into local hours by the period end and averages each bucket.
    pub fn resample(rows: impl IntoIterator<Item = ForecastRow>) -> Self {
        rows.into_iter()
            .into_group_map_by(|row| HourStamp::from(row.period_end))
            .into_iter()
            .map(|(stamp, rows)| {
                #[expect(clippy::cast_precision_loss)]
                let n_rows = rows.len() as f64;
                let point = ForecastPoint {
                    low: rows.iter().map(|row| row.point.low).sum::<KilowattHours>() / n_rows,
                    mid: rows.iter().map(|row| row.point.mid).sum::<KilowattHours>() / n_rows,
                    high: rows.iter().map(|row| row.point.high).sum::<KilowattHours>() / n_rows,
                };
                (stamp, point)
            })
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, stamp: HourStamp) -> Option<&ForecastPoint> {
        self.0.get(&stamp)
    }

    /// Earliest hour covered by the forecast.
    #[must_use]
    pub fn first_hour(&self) -> Option<HourStamp> {
        self.0.keys().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HourStamp, &ForecastPoint)> {
        self.0.iter().map(|(stamp, point)| (*stamp, point))
    }

    /// Estimate for the hour, zero production and zero clarity if the hour is not covered.
    #[must_use]
    pub fn target(&self, stamp: HourStamp, percentile: Percentile) -> TargetEstimate {
        self.get(stamp).map(|point| point.target(percentile)).unwrap_or_default()
    }

    /// Total production expected on the date.
    pub fn total_on(&self, date: NaiveDate, percentile: Percentile) -> KilowattHours {
        self.iter()
            .filter(|(stamp, _)| stamp.date == date)
            .map(|(_, point)| point.interpolate(percentile))
            .sum()
    }
}

/// Whether the feed should be polled again.
///
/// The feed is polled once at the configured hour, and otherwise only when nothing has been
/// fetched yet today.
#[must_use]
pub fn is_refresh_due(
    refreshed_at: Option<DateTime<Local>>,
    now: DateTime<Local>,
    refresh_hour: u32,
) -> bool {
    match refreshed_at {
        None => true,
        Some(refreshed_at) if refreshed_at.date_naive() != now.date_naive() => true,
        Some(refreshed_at) => now.hour() == refresh_hour && refreshed_at.hour() != refresh_hour,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;

    const POINT: ForecastPoint = ForecastPoint {
        low: KilowattHours(200.0),
        mid: KilowattHours(300.0),
        high: KilowattHours(350.0),
    };

    #[test]
    fn interpolate_below_median() {
        assert_abs_diff_eq!(POINT.interpolate(Percentile(15)), KilowattHours(212.5));
        assert_abs_diff_eq!(POINT.interpolate(Percentile(10)), KilowattHours(200.0));
        assert_abs_diff_eq!(POINT.interpolate(Percentile(50)), KilowattHours(300.0));
    }

    #[test]
    fn interpolate_above_median() {
        assert_abs_diff_eq!(POINT.interpolate(Percentile(90)), KilowattHours(350.0));
        assert_abs_diff_eq!(POINT.interpolate(Percentile(70)), KilowattHours(325.0));
    }

    #[test]
    fn interpolate_typical_percentile() {
        let point = ForecastPoint {
            low: KilowattHours(200.0),
            mid: KilowattHours(400.0),
            high: KilowattHours(500.0),
        };
        assert_abs_diff_eq!(point.interpolate(Percentile(15)), KilowattHours(225.0));
    }

    #[test]
    fn interpolation_is_monotonic() {
        let estimates: Vec<_> = (0..=100).map(|p| POINT.interpolate(Percentile(p))).collect();
        assert!(estimates.is_sorted());
    }

    #[test]
    fn extrapolation_never_goes_negative() {
        let point = ForecastPoint {
            low: KilowattHours(0.0),
            mid: KilowattHours(1.0),
            high: KilowattHours(1.0),
        };
        assert_abs_diff_eq!(point.interpolate(Percentile(0)), KilowattHours::ZERO);
    }

    #[test]
    fn clarity() {
        assert_abs_diff_eq!(POINT.clarity(), 300.0 / 350.0);
        assert_abs_diff_eq!(ForecastPoint::default().clarity(), 0.0);
    }

    #[test]
    fn missing_hour_yields_zero_estimate() {
        let forecast = Forecast::default();
        let stamp = HourStamp::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), 12);
        assert_eq!(forecast.target(stamp, Percentile(15)), TargetEstimate::default());
    }

    #[test]
    fn resample_averages_half_hours() {
        let row = |hour, minute, mid| ForecastRow {
            period_end: Local
                .with_ymd_and_hms(2025, 6, 1, hour, minute, 0)
                .unwrap()
                .with_timezone(&Utc),
            point: ForecastPoint {
                low: KilowattHours(mid / 2.0),
                mid: KilowattHours(mid),
                high: KilowattHours(mid * 2.0),
            },
        };
        let forecast = Forecast::resample([row(12, 0, 1.0), row(12, 30, 2.0), row(13, 0, 4.0)]);
        assert_eq!(forecast.len(), 2);
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let noon = forecast.get(HourStamp::new(date, 12)).unwrap();
        assert_abs_diff_eq!(noon.mid, KilowattHours(1.5));
        assert_abs_diff_eq!(noon.high, KilowattHours(3.0));
        let afternoon = forecast.get(HourStamp::new(date, 13)).unwrap();
        assert_abs_diff_eq!(afternoon.mid, KilowattHours(4.0));
        assert_eq!(forecast.first_hour(), Some(HourStamp::new(date, 12)));
    }

    #[test]
    fn total_on_sums_the_date() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let forecast: Forecast = [
            (HourStamp::new(date, 11), POINT),
            (HourStamp::new(date, 12), POINT),
            (HourStamp::new(date.succ_opt().unwrap(), 12), POINT),
        ]
        .into_iter()
        .collect();
        assert_abs_diff_eq!(forecast.total_on(date, Percentile(50)), KilowattHours(600.0));
    }

    #[test]
    fn refresh_is_due_without_previous_fetch() {
        let now = Local.with_ymd_and_hms(2025, 6, 1, 12, 10, 0).unwrap();
        assert!(is_refresh_due(None, now, 23));
    }

    #[test]
    fn refresh_is_not_due_twice_a_day() {
        let refreshed_at = Local.with_ymd_and_hms(2025, 6, 1, 8, 10, 0).unwrap();
        let now = Local.with_ymd_and_hms(2025, 6, 1, 12, 10, 0).unwrap();
        assert!(!is_refresh_due(Some(refreshed_at), now, 23));
    }

    #[test]
    fn refresh_is_due_at_refresh_hour() {
        let refreshed_at = Local.with_ymd_and_hms(2025, 6, 1, 8, 10, 0).unwrap();
        let now = Local.with_ymd_and_hms(2025, 6, 1, 23, 10, 0).unwrap();
        assert!(is_refresh_due(Some(refreshed_at), now, 23));
        assert!(!is_refresh_due(Some(now), now, 23));
    }

    #[test]
    fn refresh_is_due_on_new_day() {
        let refreshed_at = Local.with_ymd_and_hms(2025, 6, 1, 23, 10, 0).unwrap();
        let now = Local.with_ymd_and_hms(2025, 6, 2, 0, 10, 0).unwrap();
        assert!(is_refresh_due(Some(refreshed_at), now, 23));
    }
}
