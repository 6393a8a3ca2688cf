use crate::{
    core::status::{InverterStatus, PlantStatus},
    prelude::*,
    quantity::{energy::WattHours, power::Watts, proportions::{Percent, WattHoursPerPercent}},
};

/// Battery configuration as read from the inverter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BatteryParameters {
    pub capacity: WattHoursPerPercent,

    /// The inverter cuts the battery off at this level.
    pub shutdown: Percent,

    /// The inverter raises a warning at this level.
    pub low_warning: Percent,

    /// Starting state of charge currently configured for the off-peak boost.
    pub boost_state_of_charge: Percent,
}

/// Live snapshot pulled from the inverter on every telemetry refresh.
#[derive(Copy, Clone, Debug)]
pub struct Telemetry {
    pub state_of_charge: Percent,

    /// Positive when discharging.
    pub battery_power: Watts,

    pub pv_power: Watts,

    /// Positive when importing.
    pub grid_power: Watts,

    pub load_power: Watts,
    pub parameters: BatteryParameters,
    pub plant_status: PlantStatus,
    pub inverter_status: InverterStatus,
}

/// Last plausible battery reading.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BatteryState {
    pub state_of_charge: Percent,
    pub parameters: BatteryParameters,
}

impl BatteryState {
    /// Energy that can still be drawn before the inverter shuts the battery off.
    #[must_use]
    pub fn usable_energy(&self) -> WattHours {
        (self.state_of_charge - self.parameters.shutdown) * self.parameters.capacity
    }

    /// Accepts the reading unless it looks like sensor noise.
    ///
    /// Non-positive and below-shutdown readings are glitches rather than an actually
    /// depleted battery, so the previous state is kept.
    pub fn accept(previous: Option<Self>, telemetry: &Telemetry) -> Option<Self> {
        let state_of_charge = telemetry.state_of_charge;
        if state_of_charge <= Percent::ZERO || state_of_charge < telemetry.parameters.shutdown {
            warn!(%state_of_charge, "ignoring implausible state of charge");
            return previous;
        }
        Some(Self { state_of_charge, parameters: telemetry.parameters })
    }
}
