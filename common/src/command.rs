use std::fmt;

use crate::types::{DeviceState, FanSpeed, Mode};

/// A source-agnostic request to change the device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    PowerToggle,
    RaiseTemp,
    LowerTemp,
    CycleMode,
    /// Fan "down" key: Auto, High, Med, Low, Auto.
    CycleFan,
    /// Fan "up" key, the reverse walk.
    FanUp,
    SetMode(Mode),
    SetFan(FanSpeed),
    /// Full replacement of the local belief, bypassing normal transitions.
    Overwrite(DeviceState),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerToggle => f.write_str("power-toggle"),
            Self::RaiseTemp => f.write_str("raise-temp"),
            Self::LowerTemp => f.write_str("lower-temp"),
            Self::CycleMode => f.write_str("cycle-mode"),
            Self::CycleFan => f.write_str("cycle-fan"),
            Self::FanUp => f.write_str("fan-up"),
            Self::SetMode(mode) => write!(f, "set-mode({})", mode.as_str()),
            Self::SetFan(fan) => write!(f, "set-fan({})", fan.as_str()),
            Self::Overwrite(state) => write!(
                f,
                "overwrite(powered={}, temp={}, mode={}, fan={})",
                state.powered,
                state.temperature,
                state.mode.as_str(),
                state.fan_speed.as_str()
            ),
        }
    }
}
