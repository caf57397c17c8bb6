use crate::{
    codes::CodeTable,
    command::Command,
    types::{DeviceState, Mode, MAX_TEMP_F, MIN_TEMP_F},
};

/// Side effects owed to the outside world after a command is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Flash this NEC code at the appliance.
    TransmitIr(u32),
    /// Publish the full resulting state on the sync topic.
    PublishSync(DeviceState),
}

/// Pure transition function. Total over every state and command.
pub fn transition(state: DeviceState, command: Command) -> DeviceState {
    let mut next = state;
    match command {
        Command::PowerToggle => {
            next.powered = !state.powered;
            // The appliance drops out of compressor cooling when power cycled.
            if next.powered && next.mode == Mode::Cool {
                next.mode = Mode::Save;
            }
        }
        Command::RaiseTemp => {
            next.temperature = state.temperature.saturating_add(1).clamp(MIN_TEMP_F, MAX_TEMP_F);
        }
        Command::LowerTemp => {
            next.temperature = state.temperature.saturating_sub(1).clamp(MIN_TEMP_F, MAX_TEMP_F);
        }
        Command::CycleMode => next.mode = state.mode.next(),
        Command::CycleFan => next.fan_speed = state.fan_speed.step_down(),
        Command::FanUp => next.fan_speed = state.fan_speed.step_up(),
        Command::SetMode(mode) => next.mode = mode,
        Command::SetFan(fan) => next.fan_speed = fan,
        Command::Overwrite(replacement) => next = replacement,
    }
    next
}

/// Owner of the authoritative [`DeviceState`].
#[derive(Debug, Clone)]
pub struct DeviceMachine {
    state: DeviceState,
    codes: CodeTable,
}

impl DeviceMachine {
    pub fn new(codes: CodeTable) -> Self {
        Self::with_state(codes, DeviceState::default())
    }

    pub fn with_state(codes: CodeTable, state: DeviceState) -> Self {
        Self { state, codes }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Applies one admitted command and returns the effects it owes.
    ///
    /// An empty list means the command was a no-op: a non-power command while
    /// the appliance is off, or a temperature step already at its bound.
    pub fn apply(&mut self, command: Command) -> Vec<Effect> {
        if !self.state.powered && command != Command::PowerToggle {
            return Vec::new();
        }

        let next = transition(self.state, command);
        let clamped_step = matches!(command, Command::RaiseTemp | Command::LowerTemp)
            && next.temperature == self.state.temperature;
        if clamped_step {
            return Vec::new();
        }

        self.state = next;

        let mut effects = Vec::with_capacity(2);
        if let Some(code) = self.emission(command) {
            effects.push(Effect::TransmitIr(code));
        }
        effects.push(Effect::PublishSync(next));
        effects
    }

    fn emission(&self, command: Command) -> Option<u32> {
        match command {
            Command::Overwrite(_) => None,
            // No relative mode key exists; flash the key of the mode we landed on.
            Command::CycleMode => self.codes.code_for(Command::SetMode(self.state.mode)),
            other => self.codes.code_for(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        codes::{IR_FAN_AUTO, IR_FAN_DOWN, IR_FAN_UP, IR_MODE_FAN, IR_POWER_TOGGLE, IR_TEMP_UP},
        types::FanSpeed,
    };

    const ALL_COMMANDS: [Command; 14] = [
        Command::PowerToggle,
        Command::RaiseTemp,
        Command::LowerTemp,
        Command::CycleMode,
        Command::CycleFan,
        Command::FanUp,
        Command::SetMode(Mode::Cool),
        Command::SetMode(Mode::Save),
        Command::SetMode(Mode::Fan),
        Command::SetFan(FanSpeed::Auto),
        Command::SetFan(FanSpeed::High),
        Command::SetFan(FanSpeed::Med),
        Command::SetFan(FanSpeed::Low),
        Command::Overwrite(DeviceState {
            powered: true,
            temperature: 65,
            mode: Mode::Cool,
            fan_speed: FanSpeed::High,
        }),
    ];

    fn machine() -> DeviceMachine {
        DeviceMachine::new(CodeTable::appliance().unwrap())
    }

    #[test]
    fn raise_temp_from_boot_state() {
        let mut machine = machine();

        let effects = machine.apply(Command::RaiseTemp);

        let expected = DeviceState {
            temperature: 73,
            ..DeviceState::default()
        };
        assert_eq!(machine.state(), expected);
        assert_eq!(
            effects,
            vec![Effect::TransmitIr(IR_TEMP_UP), Effect::PublishSync(expected)]
        );
    }

    #[test]
    fn temperature_steps_are_inverse_inside_bounds() {
        let mut machine = machine();
        machine.apply(Command::RaiseTemp);
        machine.apply(Command::LowerTemp);
        assert_eq!(machine.state().temperature, 72);

        machine.apply(Command::LowerTemp);
        machine.apply(Command::RaiseTemp);
        assert_eq!(machine.state().temperature, 72);
    }

    #[test]
    fn temperature_clamps_without_side_effects() {
        let codes = CodeTable::appliance().unwrap();
        let mut hot = DeviceMachine::with_state(
            codes,
            DeviceState {
                temperature: 90,
                ..DeviceState::default()
            },
        );
        assert!(hot.apply(Command::RaiseTemp).is_empty());
        assert_eq!(hot.state().temperature, 90);

        let mut cold = DeviceMachine::with_state(
            codes,
            DeviceState {
                temperature: 60,
                ..DeviceState::default()
            },
        );
        assert!(cold.apply(Command::LowerTemp).is_empty());
        assert_eq!(cold.state().temperature, 60);
    }

    #[test]
    fn fan_keys_walk_opposite_directions() {
        let mut machine = machine();

        let effects = machine.apply(Command::CycleFan);
        assert_eq!(machine.state().fan_speed, FanSpeed::Auto);
        assert_eq!(effects[0], Effect::TransmitIr(IR_FAN_DOWN));

        let effects = machine.apply(Command::FanUp);
        assert_eq!(machine.state().fan_speed, FanSpeed::Low);
        assert_eq!(effects[0], Effect::TransmitIr(IR_FAN_UP));
    }

    #[test]
    fn cycle_mode_flashes_the_new_mode() {
        let mut machine = machine();
        let effects = machine.apply(Command::CycleMode);
        assert_eq!(machine.state().mode, Mode::Fan);
        assert_eq!(effects[0], Effect::TransmitIr(IR_MODE_FAN));
    }

    #[test]
    fn absolute_sets() {
        let mut machine = machine();
        machine.apply(Command::SetMode(Mode::Cool));
        let effects = machine.apply(Command::SetFan(FanSpeed::Auto));
        assert_eq!(machine.state().mode, Mode::Cool);
        assert_eq!(machine.state().fan_speed, FanSpeed::Auto);
        assert_eq!(effects[0], Effect::TransmitIr(IR_FAN_AUTO));
    }

    #[test]
    fn power_on_leaves_cool_mode() {
        let mut machine = machine();
        machine.apply(Command::SetMode(Mode::Cool));
        machine.apply(Command::PowerToggle);
        assert!(!machine.state().powered);
        assert_eq!(machine.state().mode, Mode::Cool);

        let effects = machine.apply(Command::PowerToggle);
        assert!(machine.state().powered);
        assert_eq!(machine.state().mode, Mode::Save);
        assert_eq!(effects[0], Effect::TransmitIr(IR_POWER_TOGGLE));
    }

    #[test]
    fn power_on_keeps_save_and_fan() {
        for mode in [Mode::Save, Mode::Fan] {
            let mut machine = DeviceMachine::with_state(
                CodeTable::appliance().unwrap(),
                DeviceState {
                    powered: false,
                    mode,
                    ..DeviceState::default()
                },
            );
            machine.apply(Command::PowerToggle);
            assert_eq!(machine.state().mode, mode);
        }
    }

    #[test]
    fn powered_off_ignores_everything_but_power() {
        let off = DeviceState {
            powered: false,
            ..DeviceState::default()
        };
        for command in ALL_COMMANDS {
            if command == Command::PowerToggle {
                continue;
            }
            let mut machine = DeviceMachine::with_state(CodeTable::appliance().unwrap(), off);
            assert!(machine.apply(command).is_empty(), "{command} had effects");
            assert_eq!(machine.state(), off);
        }
    }

    #[test]
    fn overwrite_replaces_state_without_ir() {
        let mut machine = machine();
        let replacement = DeviceState {
            powered: false,
            temperature: 61,
            mode: Mode::Fan,
            fan_speed: FanSpeed::Med,
        };

        let effects = machine.apply(Command::Overwrite(replacement));

        assert_eq!(machine.state(), replacement);
        assert_eq!(effects, vec![Effect::PublishSync(replacement)]);
    }

    #[test]
    fn invariants_hold_for_long_command_sequences() {
        let mut machine = machine();
        for round in 0..500 {
            let command = ALL_COMMANDS[(round * 7 + round / 3) % ALL_COMMANDS.len()];
            let effects = machine.apply(command);
            let state = machine.state();
            assert!((60..=90).contains(&state.temperature));
            assert!(Mode::ALL.contains(&state.mode));
            assert!(FanSpeed::ALL.contains(&state.fan_speed));
            let ir_count = effects
                .iter()
                .filter(|effect| matches!(effect, Effect::TransmitIr(_)))
                .count();
            assert!(ir_count <= 1);
        }
    }
}
