use chrono::TimeDelta;

use crate::{
    core::{
        forecast::{Forecast, Percentile},
        hour::HourStamp,
        load::LoadProfile,
        shading::ShadingProfile,
    },
    quantity::energy::WattHours,
};

/// Expected solar production and consumption for any hour.
#[must_use]
#[derive(Copy, Clone, bon::Builder)]
pub struct EnergyModel<'a> {
    forecast: &'a Forecast,
    percentile: Percentile,
    shading: &'a ShadingProfile,
    load: &'a LoadProfile,
}

/// Energy flows expected within a single hour, before conversion losses.
#[derive(Copy, Clone, Debug)]
pub struct HourlyFlow {
    /// Shading-corrected production.
    pub pv: WattHours,

    pub shading: f64,
    pub load: WattHours,
}

impl EnergyModel<'_> {
    pub fn flow_on(&self, stamp: HourStamp) -> HourlyFlow {
        let shading = self.shading.on_hour(stamp.hour);
        let estimate = self.forecast.target(stamp, self.percentile).energy();
        HourlyFlow {
            pv: estimate * (1.0 - shading),
            shading,
            load: self.load.on_hour(stamp.hour) * TimeDelta::hours(1),
        }
    }
}
