//! Turns button levels, IR frames and broker messages into [`Command`]s.

use crate::{
    codes::{CodeTable, IR_NO_SIGNAL},
    command::Command,
    error::DecodeError,
    sync::decode_state,
    topics::Topics,
    types::{DeviceState, MAX_TEMP_F, MIN_TEMP_F},
};

pub const MAX_INBOUND_PAYLOAD_BYTES: usize = 512;

/// Physical buttons, numbered by their bit on the port expander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    TempDown = 0,
    TempUp = 1,
    Mode = 2,
    Fan = 3,
    Power = 4,
}

impl Button {
    pub const COUNT: usize = 5;

    /// Evaluation order within one poll. Power is checked first.
    pub const PRIORITY: [Button; Button::COUNT] = [
        Button::Power,
        Button::TempDown,
        Button::TempUp,
        Button::Mode,
        Button::Fan,
    ];

    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn command(self) -> Command {
        match self {
            Self::TempDown => Command::LowerTemp,
            Self::TempUp => Command::RaiseTemp,
            Self::Mode => Command::CycleMode,
            Self::Fan => Command::CycleFan,
            Self::Power => Command::PowerToggle,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TempDown => "temp_down",
            Self::TempUp => "temp_up",
            Self::Mode => "mode",
            Self::Fan => "fan",
            Self::Power => "power",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "temp_down" | "down" => Some(Self::TempDown),
            "temp_up" | "up" => Some(Self::TempUp),
            "mode" => Some(Self::Mode),
            "fan" => Some(Self::Fan),
            "power" => Some(Self::Power),
            _ => None,
        }
    }
}

/// One sample of the button register; a set bit means the button is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonLevels(pub u8);

impl ButtonLevels {
    pub fn released() -> Self {
        Self(0)
    }

    pub fn with(self, button: Button) -> Self {
        Self(self.0 | button.bit())
    }

    pub fn is_pressed(self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn all_released(self) -> bool {
        Button::PRIORITY.iter().all(|button| !self.is_pressed(*button))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ButtonChannel {
    held: bool,
}

/// Edge detection with chord and auto-repeat suppression.
///
/// After a press is honored, nothing else is honored until every button,
/// power included, reads released in the same poll. While the appliance is
/// off only power is a candidate; other presses neither fire nor latch.
#[derive(Debug, Clone, Default)]
pub struct ButtonArbiter {
    channels: [ButtonChannel; Button::COUNT],
    latched: bool,
}

impl ButtonArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub fn poll(&mut self, levels: ButtonLevels, powered: bool) -> Option<Button> {
        if self.latched && levels.all_released() {
            self.latched = false;
        }

        let mut honored = None;
        for button in Button::PRIORITY {
            let down = levels.is_pressed(button);
            let channel = &mut self.channels[button as usize];
            let newly_pressed = down && !channel.held;
            channel.held = down;

            let eligible = powered || button == Button::Power;
            if newly_pressed && eligible && !self.latched && honored.is_none() {
                honored = Some(button);
            }
        }

        if honored.is_some() {
            self.latched = true;
        }
        honored
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrProtocol {
    Nec,
    Unknown,
}

/// A frame as reported by the IR receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrFrame {
    pub protocol: IrProtocol,
    pub value: u64,
}

impl IrFrame {
    pub fn nec(value: u64) -> Self {
        Self {
            protocol: IrProtocol::Nec,
            value,
        }
    }
}

pub fn decode_remote(frame: IrFrame, codes: &CodeTable) -> Result<Command, DecodeError> {
    if frame.protocol == IrProtocol::Unknown {
        return Err(DecodeError::UnknownProtocol);
    }
    if frame.value == IR_NO_SIGNAL {
        return Err(DecodeError::NoSignal);
    }
    codes
        .command_for(frame.value)
        .ok_or(DecodeError::UnknownCode(frame.value))
}

/// A publish received on one of the device's subscribed topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub fn decode_network(
    message: &InboundMessage,
    topics: &Topics,
    codes: &CodeTable,
) -> Result<Command, DecodeError> {
    if message.payload.len() > MAX_INBOUND_PAYLOAD_BYTES {
        return Err(DecodeError::Oversized(message.payload.len()));
    }

    if message.topic == topics.command {
        let text = std::str::from_utf8(&message.payload).map_err(|_| DecodeError::NotUtf8)?;
        let code = parse_code(text)?;
        codes.command_for(code).ok_or(DecodeError::UnknownCode(code))
    } else if message.topic == topics.overwrite {
        decode_state(&message.payload).map(Command::Overwrite)
    } else {
        Err(DecodeError::UnexpectedTopic(message.topic.clone()))
    }
}

/// Parses a decimal or `0x`-prefixed hexadecimal code.
pub fn parse_code(text: &str) -> Result<u64, DecodeError> {
    let trimmed = text.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|_| DecodeError::InvalidCode(trimmed.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Only power toggles pass while the appliance is off.
    PoweredOff,
    /// The step would leave the supported temperature range.
    TemperatureBound,
}

/// Arbitration gate applied to every source before the state machine.
pub fn admit(command: Command, state: &DeviceState) -> Result<Command, Rejection> {
    if !state.powered && command != Command::PowerToggle {
        return Err(Rejection::PoweredOff);
    }
    match command {
        Command::RaiseTemp if state.temperature >= MAX_TEMP_F => Err(Rejection::TemperatureBound),
        Command::LowerTemp if state.temperature <= MIN_TEMP_F => Err(Rejection::TemperatureBound),
        other => Ok(other),
    }
}
