pub mod codes;
pub mod command;
pub mod config;
pub mod connectivity;
pub mod device;
pub mod display;
pub mod error;
pub mod input;
pub mod sync;
pub mod timer;
pub mod topics;
pub mod types;

pub use codes::{CodeTable, IR_NO_SIGNAL};
pub use command::Command;
pub use config::{ControllerConfig, NetworkConfig, TimingConfig};
pub use connectivity::{
    BrokerPhase, BrokerSession, BrokerStatus, Connectivity, ConnectivityState,
    ConnectivityUpdate, Handshake, LinkDriver, LinkPhase,
};
pub use device::{DeviceMachine, Effect};
pub use display::OffBounce;
pub use error::{BrokerError, ConfigError, DecodeError};
pub use input::{
    admit, decode_network, decode_remote, parse_code, Button, ButtonArbiter, ButtonLevels,
    InboundMessage, IrFrame, IrProtocol, Rejection,
};
pub use sync::{decode_state, encode_state};
pub use timer::{TimerId, TimerRegistry};
pub use topics::*;
pub use types::{DeviceState, FanSpeed, Mode, StatePayload, StatusView};
