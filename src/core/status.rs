use std::fmt::{Display, Formatter};

use comfy_table::Color;
use serde::Serialize;

/// Health of an external collaborator as of its last call.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    #[default]
    Unknown,
    Online,
    Fault,
}

impl LinkStatus {
    #[must_use]
    pub fn from_outcome<T, E>(outcome: &Result<T, E>) -> Self {
        match outcome {
            Ok(_) => Self::Online,
            Err(_) => Self::Fault,
        }
    }
}

/// Plant status as reported by the inverter cloud.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantStatus {
    Offline,
    Normal,
    Warning,
    Fault,
    #[default]
    Unknown,
}

impl From<i64> for PlantStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Offline,
            1 => Self::Normal,
            2 => Self::Warning,
            3 => Self::Fault,
            _ => Self::Unknown,
        }
    }
}

/// Inverter status as reported by the inverter cloud.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InverterStatus {
    Offline,
    Normal,
    Warning,
    Fault,
    Upgrading,
    #[default]
    Unknown,
}

impl From<i64> for InverterStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Offline,
            1 => Self::Normal,
            2 => Self::Warning,
            3 => Self::Fault,
            4 => Self::Upgrading,
            _ => Self::Unknown,
        }
    }
}

macro_rules! display_status {
    ($name:ty) => {
        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{self:?}")
            }
        }
    };
}

display_status!(LinkStatus);
display_status!(PlantStatus);
display_status!(InverterStatus);

impl LinkStatus {
    pub const fn color(self) -> Color {
        match self {
            Self::Online => Color::Green,
            Self::Fault => Color::Red,
            Self::Unknown => Color::DarkYellow,
        }
    }
}

/// Collaborator health, updated by every planner pass.
#[derive(Copy, Clone, Debug, Default, Serialize)]
pub struct Status {
    pub inverter: LinkStatus,
    pub forecast: LinkStatus,
    pub statistics: LinkStatus,
    pub store: LinkStatus,
    pub plant: PlantStatus,
    pub device: InverterStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_map_to_unknown() {
        assert_eq!(PlantStatus::from(42), PlantStatus::Unknown);
        assert_eq!(InverterStatus::from(-1), InverterStatus::Unknown);
        assert_eq!(InverterStatus::from(4), InverterStatus::Upgrading);
    }

    #[test]
    fn link_status_from_outcome() {
        assert_eq!(LinkStatus::from_outcome(&Ok::<_, ()>(())), LinkStatus::Online);
        assert_eq!(LinkStatus::from_outcome(&Err::<(), _>(())), LinkStatus::Fault);
    }
}
