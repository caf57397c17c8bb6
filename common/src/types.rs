use serde::{Deserialize, Serialize};

pub const MIN_TEMP_F: u8 = 60;
pub const MAX_TEMP_F: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Cool,
    Save,
    Fan,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Cool, Mode::Save, Mode::Fan];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cool => "cool",
            Self::Save => "save",
            Self::Fan => "fan",
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Cool => 0,
            Self::Save => 1,
            Self::Fan => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn next(self) -> Self {
        match self {
            Self::Cool => Self::Save,
            Self::Save => Self::Fan,
            Self::Fan => Self::Cool,
        }
    }
}

/// Fan settings in the order the appliance's "fan down" key walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanSpeed {
    Auto,
    High,
    Med,
    Low,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 4] = [FanSpeed::Auto, FanSpeed::High, FanSpeed::Med, FanSpeed::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::High => "high",
            Self::Med => "med",
            Self::Low => "low",
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::High => 1,
            Self::Med => 2,
            Self::Low => 3,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn step_down(self) -> Self {
        match self {
            Self::Auto => Self::High,
            Self::High => Self::Med,
            Self::Med => Self::Low,
            Self::Low => Self::Auto,
        }
    }

    pub fn step_up(self) -> Self {
        match self {
            Self::Auto => Self::Low,
            Self::High => Self::Auto,
            Self::Med => Self::High,
            Self::Low => Self::Med,
        }
    }
}

/// Local belief about the appliance. Only [`crate::DeviceMachine`] mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceState {
    pub powered: bool,
    pub temperature: u8,
    pub mode: Mode,
    pub fan_speed: FanSpeed,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            powered: true,
            temperature: 72,
            mode: Mode::Save,
            fan_speed: FanSpeed::Low,
        }
    }
}

/// Snapshot served to the status API and handed to the renderer.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub powered: bool,
    pub temperature: u8,
    pub mode: &'static str,
    #[serde(rename = "fanSpeed")]
    pub fan_speed: &'static str,
    #[serde(rename = "linkUp")]
    pub link_up: bool,
    #[serde(rename = "brokerConnected")]
    pub broker_connected: bool,
    #[serde(rename = "retryDeadlineMs")]
    pub retry_deadline_ms: Option<u64>,
    pub splash: bool,
    pub blink: bool,
    /// Position of the bouncing "Off" label; only meaningful while powered off.
    #[serde(rename = "offX")]
    pub off_x: i32,
    #[serde(rename = "offY")]
    pub off_y: i32,
}

/// Wire form of a [`DeviceState`], shared by the sync and overwrite topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    pub powered: u8,
    pub temperature: i64,
    pub mode: u8,
    #[serde(rename = "fanSpeed")]
    pub fan_speed: u8,
}

impl From<DeviceState> for StatePayload {
    fn from(state: DeviceState) -> Self {
        Self {
            powered: u8::from(state.powered),
            temperature: i64::from(state.temperature),
            mode: state.mode.index(),
            fan_speed: state.fan_speed.index(),
        }
    }
}
