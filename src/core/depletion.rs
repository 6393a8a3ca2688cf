use std::fmt::{Display, Formatter};

use chrono::{DateTime, Local, TimeDelta};
use serde::Serialize;

use crate::{
    core::{efficiency::Efficiency, energy_model::EnergyModel, hour::HourStamp},
    quantity::energy::WattHours,
};

/// Five days.
pub const HORIZON_MINUTES: u32 = 5 * 24 * 60;

/// Time until the battery hits its shutdown level.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Runtime {
    Exhausted { minutes: u32 },
    BeyondHorizon,
}

impl Runtime {
    #[must_use]
    pub fn exhausted_at(self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            Self::Exhausted { minutes } => Some(now + TimeDelta::minutes(i64::from(minutes))),
            Self::BeyondHorizon => None,
        }
    }

    /// Runtime in fractional hours, [`None`] beyond the horizon.
    #[must_use]
    pub fn hours(self) -> Option<f64> {
        match self {
            Self::Exhausted { minutes } => Some(f64::from(minutes) / 60.0),
            Self::BeyondHorizon => None,
        }
    }
}

impl Display for Runtime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted { minutes } => write!(f, "{}h{:02}m", minutes / 60, minutes % 60),
            Self::BeyondHorizon => write!(f, "beyond {} days", HORIZON_MINUTES / 60 / 24),
        }
    }
}

/// Rolls the battery forward hour by hour until it runs out.
#[must_use]
#[derive(Copy, Clone, bon::Builder)]
pub struct DepletionSimulator<'a> {
    model: EnergyModel<'a>,
    efficiency: Efficiency,
}

impl DepletionSimulator<'_> {
    /// Simulates from the start of the given hour with the given usable energy.
    #[must_use]
    pub fn run(&self, mut usable: WattHours, from: HourStamp) -> Runtime {
        let mut minutes = 0.0;
        for stamp in from.iter_forward() {
            if usable <= WattHours::ZERO {
                return Self::exhausted(minutes);
            }
            if minutes >= f64::from(HORIZON_MINUTES) {
                return Runtime::BeyondHorizon;
            }
            let flow = self.model.flow_on(stamp);
            let net = flow.pv - flow.load / self.efficiency.0;
            usable += net;
            if usable > WattHours::ZERO {
                minutes += 60.0;
            } else {
                // The battery ran out within this hour, `net` is negative here:
                return Self::exhausted(minutes + 60.0 - usable / net * 60.0);
            }
        }
        Runtime::BeyondHorizon
    }

    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn exhausted(minutes: f64) -> Runtime {
        Runtime::Exhausted { minutes: minutes.max(0.0) as u32 }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        core::{
            forecast::{Forecast, ForecastPoint, Percentile},
            load::LoadProfile,
            shading::ShadingProfile,
        },
        quantity::{energy::KilowattHours, power::Watts},
    };

    fn start() -> HourStamp {
        HourStamp::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), 20)
    }

    fn simulate(forecast: &Forecast, load: Watts, efficiency: f64, usable: WattHours) -> Runtime {
        let shading = ShadingProfile::default();
        let load = LoadProfile::uniform(load);
        let model = EnergyModel::builder()
            .forecast(forecast)
            .percentile(Percentile(50))
            .shading(&shading)
            .load(&load)
            .build();
        DepletionSimulator::builder()
            .model(model)
            .efficiency(Efficiency(efficiency))
            .build()
            .run(usable, start())
    }

    #[test]
    fn constant_load_without_sun() {
        let runtime = simulate(&Forecast::default(), Watts(1000.0), 1.0, WattHours(2000.0));
        assert_eq!(runtime, Runtime::Exhausted { minutes: 120 });
    }

    #[test]
    fn exhaustion_within_an_hour() {
        let runtime = simulate(&Forecast::default(), Watts(1000.0), 1.0, WattHours(1500.0));
        assert_eq!(runtime, Runtime::Exhausted { minutes: 90 });
    }

    #[test]
    fn losses_shorten_the_runtime() {
        let runtime = simulate(&Forecast::default(), Watts(800.0), 0.8, WattHours(2000.0));
        assert_eq!(runtime, Runtime::Exhausted { minutes: 120 });
    }

    #[test]
    fn empty_battery_is_exhausted_immediately() {
        let runtime = simulate(&Forecast::default(), Watts(1000.0), 1.0, WattHours::ZERO);
        assert_eq!(runtime, Runtime::Exhausted { minutes: 0 });
    }

    #[test]
    fn no_load_lasts_beyond_horizon() {
        let runtime = simulate(&Forecast::default(), Watts::ZERO, 1.0, WattHours(100.0));
        assert_eq!(runtime, Runtime::BeyondHorizon);
    }

    #[test]
    fn sun_extends_the_runtime() {
        let point = ForecastPoint {
            low: KilowattHours(1.0),
            mid: KilowattHours(1.0),
            high: KilowattHours(1.0),
        };
        let forecast: Forecast = [(start().next(), point)].into_iter().collect();
        let runtime = simulate(&forecast, Watts(1000.0), 1.0, WattHours(1500.0));
        assert_eq!(runtime, Runtime::Exhausted { minutes: 150 });
    }

    #[test]
    fn hours() {
        assert_eq!(Runtime::Exhausted { minutes: 90 }.hours(), Some(1.5));
        assert_eq!(Runtime::BeyondHorizon.hours(), None);
    }

    #[test]
    fn display() {
        assert_eq!(Runtime::Exhausted { minutes: 125 }.to_string(), "2h05m");
        assert_eq!(Runtime::BeyondHorizon.to_string(), "beyond 5 days");
    }
}
