//! Snapshot encoding for the sync topic and decoding for the overwrite topic.
//!
//! Every outbound message carries the complete state, so a subscriber that
//! missed messages is corrected by the next one.

use crate::{
    error::DecodeError,
    types::{DeviceState, FanSpeed, Mode, StatePayload, MAX_TEMP_F, MIN_TEMP_F},
};

pub fn encode_state(state: DeviceState) -> Vec<u8> {
    // A struct of plain integers always serializes.
    serde_json::to_vec(&StatePayload::from(state)).unwrap_or_default()
}

pub fn decode_state(payload: &[u8]) -> Result<DeviceState, DecodeError> {
    let wire: StatePayload = serde_json::from_slice(payload)
        .map_err(|err| DecodeError::MalformedPayload(err.to_string()))?;
    DeviceState::try_from(wire)
}

impl TryFrom<StatePayload> for DeviceState {
    type Error = DecodeError;

    fn try_from(wire: StatePayload) -> Result<Self, Self::Error> {
        let powered = match wire.powered {
            0 => false,
            1 => true,
            other => {
                return Err(DecodeError::OutOfRange {
                    field: "powered",
                    value: i64::from(other),
                })
            }
        };

        let temperature = u8::try_from(wire.temperature)
            .ok()
            .filter(|temp| (MIN_TEMP_F..=MAX_TEMP_F).contains(temp))
            .ok_or(DecodeError::OutOfRange {
                field: "temperature",
                value: wire.temperature,
            })?;

        let mode = Mode::from_index(wire.mode).ok_or(DecodeError::OutOfRange {
            field: "mode",
            value: i64::from(wire.mode),
        })?;

        let fan_speed = FanSpeed::from_index(wire.fan_speed).ok_or(DecodeError::OutOfRange {
            field: "fanSpeed",
            value: i64::from(wire.fan_speed),
        })?;

        Ok(Self {
            powered,
            temperature,
            mode,
            fan_speed,
        })
    }
}
