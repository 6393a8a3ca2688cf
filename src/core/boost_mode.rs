use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::quantity::proportions::Percent;

/// How the planned boost is applied to the inverter.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BoostMode {
    /// Always charge to the fixed, user-configured state of charge.
    Manual,

    /// Charge to the planned state of charge.
    Automatic,

    /// Disable the boost window.
    Off,

    /// Plan, but never write anything to the inverter.
    #[default]
    Testing,
}

impl Display for BoostMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "Manual"),
            Self::Automatic => write!(f, "Automatic"),
            Self::Off => write!(f, "Off"),
            Self::Testing => write!(f, "Testing"),
        }
    }
}

/// Boost window setting to be written to the inverter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoostSetting {
    pub state_of_charge: u8,
    pub is_enabled: bool,
}

impl BoostMode {
    /// Setting to write, or [`None`] when nothing may be written.
    #[must_use]
    pub fn setting(self, planned: u8, manual: Percent) -> Option<BoostSetting> {
        match self {
            Self::Manual => {
                #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let state_of_charge = manual.0.round().clamp(0.0, 100.0) as u8;
                Some(BoostSetting { state_of_charge, is_enabled: true })
            }
            Self::Automatic => Some(BoostSetting { state_of_charge: planned, is_enabled: true }),
            Self::Off => Some(BoostSetting { state_of_charge: 0, is_enabled: false }),
            Self::Testing => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testing_suppresses_the_write() {
        assert_eq!(BoostMode::Testing.setting(42, Percent(50.0)), None);
    }

    #[test]
    fn automatic_uses_planned_value() {
        assert_eq!(
            BoostMode::Automatic.setting(42, Percent(50.0)),
            Some(BoostSetting { state_of_charge: 42, is_enabled: true }),
        );
    }

    #[test]
    fn manual_uses_configured_value() {
        assert_eq!(
            BoostMode::Manual.setting(42, Percent(50.0)),
            Some(BoostSetting { state_of_charge: 50, is_enabled: true }),
        );
    }

    #[test]
    fn off_disables_the_window() {
        assert_eq!(
            BoostMode::Off.setting(42, Percent(50.0)),
            Some(BoostSetting { state_of_charge: 0, is_enabled: false }),
        );
    }
}
