use serde::{Deserialize, Serialize};

use crate::quantity::energy::KilowattHours;

/// Lifetime energy counters of the inverter.
#[derive(Copy, Clone, Debug, Default)]
pub struct LifetimeTotals {
    pub pv: KilowattHours,
    pub grid_import: KilowattHours,
    pub battery_charge: KilowattHours,
    pub battery_discharge: KilowattHours,
    pub load: KilowattHours,
}

/// Round-trip system efficiency: how much of the energy that entered the system reached the load.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Serialize, Deserialize, derive_more::FromStr)]
pub struct Efficiency(pub f64);

impl Default for Efficiency {
    fn default() -> Self {
        Self(0.85)
    }
}

impl Efficiency {
    /// Estimates the efficiency from the lifetime totals, rounded to two decimals.
    ///
    /// Falls back to `default` when the totals do not make sense yet,
    /// for example, right after the inverter has been commissioned.
    #[must_use]
    pub fn estimate(totals: &LifetimeTotals, default: Self) -> Self {
        let supplied =
            totals.pv + totals.grid_import + totals.battery_discharge - totals.battery_charge;
        if supplied.0 <= 0.0 || totals.load.0 <= 0.0 {
            return default;
        }
        let ratio = (totals.load / supplied * 100.0).round() / 100.0;
        if ratio > 0.0 && ratio <= 1.0 { Self(ratio) } else { default }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn estimate_from_totals() {
        let totals = LifetimeTotals {
            pv: KilowattHours(8000.0),
            grid_import: KilowattHours(3000.0),
            battery_charge: KilowattHours(2000.0),
            battery_discharge: KilowattHours(1800.0),
            load: KilowattHours(9000.0),
        };
        assert_abs_diff_eq!(Efficiency::estimate(&totals, Efficiency::default()).0, 0.83);
    }

    #[test]
    fn empty_totals_fall_back() {
        let estimate = Efficiency::estimate(&LifetimeTotals::default(), Efficiency(0.9));
        assert_abs_diff_eq!(estimate.0, 0.9);
    }

    #[test]
    fn implausible_ratio_falls_back() {
        let totals = LifetimeTotals {
            pv: KilowattHours(100.0),
            load: KilowattHours(500.0),
            ..LifetimeTotals::default()
        };
        assert_abs_diff_eq!(Efficiency::estimate(&totals, Efficiency::default()).0, 0.85);
    }
}
