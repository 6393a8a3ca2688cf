use std::ops::Mul;

use crate::quantity::energy::WattHours;

quantity!(Percent, suffix: "%", precision: 0);
quantity!(WattHoursPerPercent, suffix: "Wh/%", precision: 1);

impl Percent {
    pub const FULL: Self = Self(100.0);
}

impl Mul<WattHoursPerPercent> for Percent {
    type Output = WattHours;

    fn mul(self, rhs: WattHoursPerPercent) -> Self::Output {
        WattHours(self.0 * rhs.0)
    }
}

impl WattHoursPerPercent {
    /// Battery capacity as reported by the inverter: `capacity_ah × float_voltage / 100`.
    #[must_use]
    pub fn from_capacity(amp_hours: f64, float_voltage: f64) -> Self {
        Self(amp_hours * float_voltage / 100.0)
    }

    /// Substitutes one watt-hour per percent for a non-positive capacity.
    #[must_use]
    pub fn or_unit(self) -> Self {
        if self.0 > 0.0 { self } else { Self(1.0) }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn capacity_from_inverter_settings() {
        let capacity = WattHoursPerPercent::from_capacity(400.0, 55.2);
        assert_abs_diff_eq!(capacity, WattHoursPerPercent(220.8), epsilon = 1e-9);
        assert_abs_diff_eq!(Percent(50.0) * capacity, WattHours(11_040.0), epsilon = 1e-9);
        assert_abs_diff_eq!(WattHours(2208.0) / capacity, Percent(10.0), epsilon = 1e-9);
    }

    #[test]
    fn zero_capacity_falls_back_to_unit() {
        assert_abs_diff_eq!(WattHoursPerPercent::ZERO.or_unit(), WattHoursPerPercent(1.0));
        assert_abs_diff_eq!(WattHoursPerPercent(-3.0).or_unit(), WattHoursPerPercent(1.0));
    }
}
