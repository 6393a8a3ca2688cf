use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    core::{efficiency::Efficiency, energy_model::EnergyModel, hour::HourStamp},
    prelude::*,
    quantity::{
        energy::WattHours,
        proportions::{Percent, WattHoursPerPercent},
    },
};

/// The highest state of charge the boost may target.
pub const MAX_TARGET: u8 = 99;

/// Single hour of the boost trace.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct BoostStep {
    pub hour: u32,
    pub pv: WattHours,
    pub shading: f64,
    pub load: WattHours,
    pub net: WattHours,
    pub delta: Percent,

    /// Running state of charge after the hour, capped at 100%.
    pub state_of_charge: Percent,
}

/// Planned off-peak boost for a single day.
#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct BoostPlan {
    pub date: NaiveDate,

    /// State of charge to charge the battery to before the day starts, `0..=99`.
    pub target_state_of_charge: u8,

    /// The floor the plan keeps the battery above.
    pub min_energy: WattHours,

    /// Hour-by-hour replay of the day starting from the target.
    pub steps: Vec<BoostStep>,
}

impl BoostPlan {
    /// The lowest state of charge reached during the replay.
    #[must_use]
    pub fn trough(&self) -> Option<Percent> {
        self.steps.iter().map(|step| step.state_of_charge).min()
    }
}

/// Sizes the off-peak boost so that the battery never drops below the floor during the day.
#[must_use]
#[derive(Copy, Clone, bon::Builder)]
pub struct GridBoostPlanner<'a> {
    model: EnergyModel<'a>,
    efficiency: Efficiency,
    capacity: WattHoursPerPercent,
    min_state_of_charge: Percent,

    /// First hour after the off-peak window.
    #[builder(default = 6)]
    day_start_hour: u32,
}

impl GridBoostPlanner<'_> {
    #[instrument(skip_all, fields(date = %date))]
    pub fn plan(&self, date: NaiveDate) -> BoostPlan {
        let target_state_of_charge = self.size(date);
        let steps = self.replay(date, Percent(f64::from(target_state_of_charge)));
        let plan = BoostPlan {
            date,
            target_state_of_charge,
            min_energy: self.min_state_of_charge * self.capacity,
            steps,
        };
        info!(
            target = plan.target_state_of_charge,
            trough = ?plan.trough(),
            "planned the boost",
        );
        plan
    }

    /// Sizing pass: the starting level that keeps the running trough above the floor.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn size(&self, date: NaiveDate) -> u8 {
        let lowest = self
            .deltas(date)
            .scan(Percent::ZERO, |running, step| {
                *running += step.delta;
                Some(*running)
            })
            .fold(Percent::ZERO, Percent::min);
        let required = self.min_state_of_charge - lowest;
        required.0.round().clamp(0.0, f64::from(MAX_TARGET)) as u8
    }

    /// Reporting pass: replays the same hours from the chosen starting level.
    fn replay(&self, date: NaiveDate, start: Percent) -> Vec<BoostStep> {
        self.deltas(date)
            .scan(start, |state_of_charge, step| {
                *state_of_charge = (*state_of_charge + step.delta).min(Percent::FULL);
                Some(BoostStep { state_of_charge: *state_of_charge, ..step })
            })
            .collect()
    }

    fn deltas(&self, date: NaiveDate) -> impl Iterator<Item = BoostStep> {
        let capacity = self.capacity.or_unit();
        (self.day_start_hour..24).map(move |hour| {
            let flow = self.model.flow_on(HourStamp::new(date, hour));
            let load = flow.load * self.efficiency.0;
            let net = flow.pv - load;
            BoostStep {
                hour,
                pv: flow.pv,
                shading: flow.shading,
                load,
                net,
                delta: net / capacity,
                state_of_charge: Percent::ZERO,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        core::{
            forecast::{Forecast, ForecastPoint, Percentile},
            load::LoadProfile,
            shading::ShadingProfile,
        },
        quantity::{energy::KilowattHours, power::Watts},
    };

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn plan(forecast: &Forecast, load: Watts, capacity: f64, min_state_of_charge: f64) -> BoostPlan {
        let shading = ShadingProfile::default();
        let load = LoadProfile::uniform(load);
        let model = EnergyModel::builder()
            .forecast(forecast)
            .percentile(Percentile(50))
            .shading(&shading)
            .load(&load)
            .build();
        GridBoostPlanner::builder()
            .model(model)
            .efficiency(Efficiency(1.0))
            .capacity(WattHoursPerPercent(capacity))
            .min_state_of_charge(Percent(min_state_of_charge))
            .build()
            .plan(date())
    }

    fn sunny_forecast(kwh: f64) -> Forecast {
        let point = ForecastPoint {
            low: KilowattHours(kwh),
            mid: KilowattHours(kwh),
            high: KilowattHours(kwh),
        };
        (0..24).map(|hour| (HourStamp::new(date(), hour), point)).collect()
    }

    #[test]
    fn dark_day_is_capped() {
        let plan = plan(&Forecast::default(), Watts(500.0), 100.0, 10.0);
        assert_eq!(plan.target_state_of_charge, 99);
        assert_eq!(plan.steps.len(), 18);
        assert_eq!(plan.steps[0].hour, 6);
        assert_abs_diff_eq!(plan.min_energy, WattHours(1000.0));
    }

    #[test]
    fn moderate_deficit() {
        let plan = plan(&Forecast::default(), Watts(100.0), 100.0, 10.0);
        assert_eq!(plan.target_state_of_charge, 28);
        assert_abs_diff_eq!(plan.trough().unwrap(), Percent(10.0), epsilon = 1e-9);
    }

    #[test]
    fn surplus_day_needs_only_the_floor() {
        let plan = plan(&sunny_forecast(1.0), Watts(500.0), 100.0, 10.0);
        assert_eq!(plan.target_state_of_charge, 10);
    }

    #[test]
    fn replay_caps_at_full() {
        let plan = plan(&sunny_forecast(5.0), Watts(0.0), 100.0, 10.0);
        assert!(plan.steps.iter().all(|step| step.state_of_charge <= Percent::FULL));
        assert_abs_diff_eq!(plan.steps.last().unwrap().state_of_charge, Percent::FULL);
    }

    #[test]
    fn zero_capacity_does_not_divide_by_zero() {
        let plan = plan(&Forecast::default(), Watts(1.0), 0.0, 0.0);
        assert_eq!(plan.target_state_of_charge, 18);
    }

    #[test]
    fn target_stays_in_range() {
        for load in [0.0, 1.0, 50.0, 500.0, 1e9] {
            for capacity in [0.0, 1.0, 100.0, 1e6] {
                for floor in [-50.0, 0.0, 10.0, 150.0] {
                    let plan = plan(&sunny_forecast(0.3), Watts(load), capacity, floor);
                    assert!(plan.target_state_of_charge <= MAX_TARGET);
                }
            }
        }
    }
}
