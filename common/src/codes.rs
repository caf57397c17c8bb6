//! Bidirectional table between commands and the appliance's 32-bit NEC codes.

use crate::{
    command::Command,
    error::ConfigError,
    types::{FanSpeed, Mode},
};

/// Value the receiver reports when a frame carried no usable signal.
pub const IR_NO_SIGNAL: u64 = u64::MAX;

pub const IR_POWER_TOGGLE: u32 = 0x10AF_8877;
pub const IR_TEMP_UP: u32 = 0x10AF_708F;
pub const IR_TEMP_DOWN: u32 = 0x10AF_B04F;
pub const IR_FAN_DOWN: u32 = 0x10AF_20DF;
pub const IR_FAN_UP: u32 = 0x10AF_807F;
pub const IR_MODE_COOL: u32 = 0x10AF_906F;
pub const IR_MODE_SAVE: u32 = 0x10AF_40BF;
pub const IR_MODE_FAN: u32 = 0x10AF_E01F;
pub const IR_FAN_AUTO: u32 = 0x10AF_F00F;

pub const APPLIANCE_CODES: [(Command, u32); 9] = [
    (Command::PowerToggle, IR_POWER_TOGGLE),
    (Command::RaiseTemp, IR_TEMP_UP),
    (Command::LowerTemp, IR_TEMP_DOWN),
    (Command::CycleFan, IR_FAN_DOWN),
    (Command::FanUp, IR_FAN_UP),
    (Command::SetMode(Mode::Cool), IR_MODE_COOL),
    (Command::SetMode(Mode::Save), IR_MODE_SAVE),
    (Command::SetMode(Mode::Fan), IR_MODE_FAN),
    (Command::SetFan(FanSpeed::Auto), IR_FAN_AUTO),
];

#[derive(Debug, Clone, Copy)]
pub struct CodeTable {
    entries: &'static [(Command, u32)],
}

impl CodeTable {
    /// Builds a table after checking that codes and commands are both unique.
    pub fn new(entries: &'static [(Command, u32)]) -> Result<Self, ConfigError> {
        for (index, (command, code)) in entries.iter().enumerate() {
            for (other_command, other_code) in &entries[index + 1..] {
                if code == other_code {
                    return Err(ConfigError::DuplicateCode(*code));
                }
                if command == other_command {
                    return Err(ConfigError::DuplicateCommand(command.to_string()));
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn appliance() -> Result<Self, ConfigError> {
        Self::new(&APPLIANCE_CODES)
    }

    pub fn command_for(&self, code: u64) -> Option<Command> {
        self.entries
            .iter()
            .find(|(_, known)| u64::from(*known) == code)
            .map(|(command, _)| *command)
    }

    pub fn code_for(&self, command: Command) -> Option<u32> {
        self.entries
            .iter()
            .find(|(known, _)| *known == command)
            .map(|(_, code)| *code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
