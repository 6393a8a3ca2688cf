use std::ops::Div;

use chrono::TimeDelta;

use crate::quantity::{
    power::Watts,
    proportions::{Percent, WattHoursPerPercent},
};

quantity!(WattHours, suffix: "Wh", precision: 0);
quantity!(KilowattHours, suffix: "kWh", precision: 2);

impl From<KilowattHours> for WattHours {
    fn from(kilowatt_hours: KilowattHours) -> Self {
        Self(kilowatt_hours.0 * 1000.0)
    }
}

impl From<WattHours> for KilowattHours {
    fn from(watt_hours: WattHours) -> Self {
        Self(watt_hours.0 / 1000.0)
    }
}

impl Div<WattHoursPerPercent> for WattHours {
    type Output = Percent;

    fn div(self, rhs: WattHoursPerPercent) -> Self::Output {
        Percent(self.0 / rhs.0)
    }
}

impl Div<TimeDelta> for WattHours {
    type Output = Watts;

    fn div(self, duration: TimeDelta) -> Self::Output {
        Watts(self.0 * 3600.0 / duration.as_seconds_f64())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn energy_over_time_is_power() {
        assert_abs_diff_eq!(WattHours(250.0) / TimeDelta::minutes(30), Watts(500.0));
    }
}
