use bon::Builder;
use chrono::TimeDelta;

use crate::{
    core::{
        boost_mode::BoostMode,
        efficiency::Efficiency,
        forecast::Percentile,
        shading::ShadingLearner,
    },
    prelude::*,
    quantity::{power::Watts, proportions::Percent},
};

/// Planner configuration, fixed for the lifetime of the process.
#[must_use]
#[derive(Copy, Clone, Debug, Builder)]
pub struct Settings {
    #[builder(default)]
    pub percentile: Percentile,

    /// Hour of day at which the forecast is refreshed for the next day.
    #[builder(default = 23)]
    pub forecast_refresh_hour: u32,

    /// How many past days the load profile is averaged over.
    #[builder(default = 3)]
    pub history_days: u32,

    /// Floor the boost keeps the battery above.
    #[builder(default = Percent(10.0))]
    pub min_state_of_charge: Percent,

    #[builder(default)]
    pub boost_mode: BoostMode,

    /// Boost target in the manual mode.
    #[builder(default = Percent(50.0))]
    pub manual_boost: Percent,

    /// First hour after the off-peak window.
    #[builder(default = 6)]
    pub day_start_hour: u32,

    #[builder(default)]
    pub shading: ShadingLearner,

    /// Assumed consumption for hours without any history.
    #[builder(default = Watts(1000.0))]
    pub fallback_load: Watts,

    /// Used until the inverter totals allow estimating the actual efficiency.
    #[builder(default)]
    pub default_efficiency: Efficiency,
}

impl Default for Settings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Settings {
    pub fn validate(&self) -> Result {
        ensure!(self.percentile.0 <= 100, "percentile must be within 0..=100");
        ensure!(self.forecast_refresh_hour < 24, "refresh hour must be within 0..24");
        ensure!((1..=14).contains(&self.history_days), "history must span 1 to 14 days");
        ensure!(
            (Percent::ZERO..=Percent::FULL).contains(&self.min_state_of_charge),
            "minimum state of charge must be within 0..=100%",
        );
        ensure!(
            (Percent::ZERO..=Percent::FULL).contains(&self.manual_boost),
            "manual boost must be within 0..=100%",
        );
        ensure!(self.day_start_hour < 24, "day start hour must be within 0..24");
        ensure!(
            (0.0..=1.0).contains(&self.shading.min_clarity),
            "clarity threshold must be within 0..=1",
        );
        ensure!(
            self.default_efficiency.0 > 0.0 && self.default_efficiency.0 <= 1.0,
            "efficiency must be within (0, 1]",
        );
        Ok(())
    }

    #[must_use]
    pub fn history_window(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.history_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() -> Result {
        let settings = Settings::default();
        settings.validate()?;
        assert_eq!(settings.percentile, Percentile(15));
        assert_eq!(settings.boost_mode, BoostMode::Testing);
        Ok(())
    }

    #[test]
    fn rejects_long_history() {
        assert!(Settings::builder().history_days(30).build().validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_percentile() {
        assert!(Settings::builder().percentile(Percentile(101)).build().validate().is_err());
    }
}
