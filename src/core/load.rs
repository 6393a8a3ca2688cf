use chrono::{DateTime, Local, NaiveDate, Timelike};
use itertools::Itertools;

use crate::{prelude::*, quantity::power::Watts};

/// Hourly mean of a power sensor, as aggregated by the statistics backend.
#[derive(Copy, Clone, Debug)]
pub struct HourlyMean {
    pub start: DateTime<Local>,
    pub mean: Watts,
}

/// Expected household consumption for each hour of day.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LoadProfile(pub [Watts; 24]);

impl LoadProfile {
    pub const fn uniform(power: Watts) -> Self {
        Self([power; 24])
    }

    /// Averages the samples by hour of day across all dates.
    ///
    /// Hours without any samples get the fallback value.
    pub fn from_samples(samples: &[HourlyMean], fallback: Watts) -> Self {
        let hourly = samples
            .iter()
            .into_group_map_by(|sample| sample.start.hour())
            .into_iter()
            .map(|(hour, samples)| {
                #[expect(clippy::cast_precision_loss)]
                let mean = samples.iter().map(|sample| sample.mean).sum::<Watts>()
                    / samples.len() as f64;
                (hour, mean)
            })
            .fold([fallback; 24], |mut hourly, (hour, mean)| {
                hourly[hour as usize] = mean;
                hourly
            });
        Self(hourly)
    }

    #[must_use]
    pub fn on_hour(&self, hour: u32) -> Watts {
        self.0[hour as usize % 24]
    }

    pub fn iter(&self) -> impl Iterator<Item = Watts> {
        self.0.iter().copied()
    }
}

/// Keeps the load profile fresh, recomputing it at most once a calendar day.
#[must_use]
pub struct LoadProfileEstimator {
    profile: LoadProfile,
    computed_on: Option<NaiveDate>,
    fallback: Watts,
}

impl LoadProfileEstimator {
    pub const fn new(fallback: Watts) -> Self {
        Self { profile: LoadProfile::uniform(fallback), computed_on: None, fallback }
    }

    pub const fn profile(&self) -> &LoadProfile {
        &self.profile
    }

    #[must_use]
    pub const fn computed_on(&self) -> Option<NaiveDate> {
        self.computed_on
    }

    #[must_use]
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.computed_on != Some(today)
    }

    /// Rebuilds the profile from the historical samples, unless it has been done today already.
    ///
    /// Without any samples, the profile falls back to the uniform default and is not marked
    /// as computed, so that the next pass retries.
    pub fn update(&mut self, today: NaiveDate, samples: &[HourlyMean]) -> &LoadProfile {
        if !self.is_due(today) {
            debug!(computed_on = ?self.computed_on, "load profile is up to date");
        } else if samples.is_empty() {
            warn!(fallback = %self.fallback, "no load history, using the uniform profile");
            self.profile = LoadProfile::uniform(self.fallback);
        } else {
            self.profile = LoadProfile::from_samples(samples, self.fallback);
            self.computed_on = Some(today);
            info!(n_samples = samples.len(), "updated the load profile");
        }
        &self.profile
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;

    fn sample(day: u32, hour: u32, mean: f64) -> HourlyMean {
        HourlyMean {
            start: Local.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap(),
            mean: Watts(mean),
        }
    }

    #[test]
    fn averages_by_hour_of_day_across_dates() {
        let profile =
            LoadProfile::from_samples(&[sample(1, 8, 400.0), sample(2, 8, 600.0)], Watts(1000.0));
        assert_abs_diff_eq!(profile.on_hour(8), Watts(500.0));
    }

    #[test]
    fn missing_hours_use_fallback() {
        let profile = LoadProfile::from_samples(&[sample(1, 8, 400.0)], Watts(1000.0));
        assert_abs_diff_eq!(profile.on_hour(7), Watts(1000.0));
        assert_eq!(profile.iter().count(), 24);
    }

    #[test]
    fn update_is_idempotent_within_a_day() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 4).unwrap();
        let mut estimator = LoadProfileEstimator::new(Watts(1000.0));
        let first = *estimator.update(today, &[sample(1, 8, 400.0)]);
        let second = *estimator.update(today, &[sample(1, 8, 900.0)]);
        assert_eq!(first, second);
        assert_eq!(estimator.computed_on(), Some(today));
    }

    #[test]
    fn update_recomputes_on_next_day() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 4).unwrap();
        let mut estimator = LoadProfileEstimator::new(Watts(1000.0));
        estimator.update(today, &[sample(1, 8, 400.0)]);
        let profile = estimator.update(today.succ_opt().unwrap(), &[sample(2, 8, 900.0)]);
        assert_abs_diff_eq!(profile.on_hour(8), Watts(900.0));
    }

    #[test]
    fn empty_history_falls_back_without_marking() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 4).unwrap();
        let mut estimator = LoadProfileEstimator::new(Watts(1000.0));
        let profile = *estimator.update(today, &[]);
        assert_eq!(profile, LoadProfile::uniform(Watts(1000.0)));
        assert!(estimator.is_due(today));
    }
}
