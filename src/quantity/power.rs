use std::ops::Mul;

use chrono::TimeDelta;

use crate::quantity::energy::WattHours;

quantity!(Watts, suffix: "W", precision: 0);

impl Mul<TimeDelta> for Watts {
    type Output = WattHours;

    fn mul(self, duration: TimeDelta) -> Self::Output {
        WattHours(self.0 * duration.as_seconds_f64() / 3600.0)
    }
}
