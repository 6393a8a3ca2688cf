use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::{
    core::forecast::TargetEstimate,
    prelude::*,
    quantity::{power::Watts, proportions::Percent},
};

/// Learned fraction of the forecast lost to local shading, per hour of day.
///
/// `0.0` means the hour produces as forecast, `1.0` means it is fully shaded.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadingProfile {
    pub hourly: [f64; 24],
}

impl Default for ShadingProfile {
    fn default() -> Self {
        Self { hourly: [0.0; 24] }
    }
}

impl ShadingProfile {
    #[must_use]
    pub fn on_hour(&self, hour: u32) -> f64 {
        self.hourly[hour as usize % 24]
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> {
        self.hourly.iter().copied()
    }
}

/// What actually happened in a past hour, compared to what had been forecast for it.
#[derive(Copy, Clone, Debug)]
pub struct Observation {
    pub hour: u32,

    /// Mean solar power over the hour.
    pub realized: Watts,

    pub forecast: TargetEstimate,
    pub state_of_charge: Percent,
}

/// Decides when an hour is trustworthy enough to learn shading from.
#[derive(Copy, Clone, Debug, bon::Builder)]
pub struct ShadingLearner {
    /// Only clear-sky hours tell shading apart from clouds.
    #[builder(default = 0.95)]
    pub min_clarity: f64,

    /// Near-full batteries curtail solar production, which would read as shading.
    #[builder(default = Percent(96.0))]
    pub max_state_of_charge: Percent,
}

impl Default for ShadingLearner {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ShadingLearner {
    /// Shading coefficient implied by the observation, if the observation qualifies.
    #[must_use]
    pub fn coefficient(&self, observation: &Observation) -> Option<f64> {
        let realized = observation.realized * TimeDelta::hours(1);
        let forecast = observation.forecast.energy();
        let qualifies = realized.0 > 0.0
            && forecast.0 > 0.0
            && observation.state_of_charge < self.max_state_of_charge
            && observation.forecast.clarity > self.min_clarity;
        qualifies.then(|| 1.0 - (realized / forecast).min(1.0))
    }

    /// Updates the profile entry for the observed hour, returning the new coefficient.
    pub fn learn(&self, profile: &mut ShadingProfile, observation: &Observation) -> Option<f64> {
        let Some(coefficient) = self.coefficient(observation) else {
            debug!(
                hour = observation.hour,
                realized = %observation.realized,
                clarity = observation.forecast.clarity,
                state_of_charge = %observation.state_of_charge,
                "observation does not qualify for shading",
            );
            return None;
        };
        profile.hourly[observation.hour as usize % 24] = coefficient;
        info!(hour = observation.hour, coefficient, "learned shading");
        Some(coefficient)
    }
}
