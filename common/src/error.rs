use thiserror::Error;

/// Startup configuration problems. Any of these halts initialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration value `{0}`")]
    Missing(&'static str),

    #[error("invalid configuration value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("timer budget of {0} exhausted")]
    TimerBudgetExhausted(usize),

    #[error("IR code {0:#010X} is mapped more than once")]
    DuplicateCode(u32),

    #[error("command {0} is mapped to more than one IR code")]
    DuplicateCommand(String),
}

/// Reasons an inbound frame or message never becomes a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame decoded with an unknown protocol")]
    UnknownProtocol,

    #[error("no-signal sentinel")]
    NoSignal,

    #[error("unknown IR code {0:#X}")]
    UnknownCode(u64),

    #[error("unparsable code payload `{0}`")]
    InvalidCode(String),

    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("malformed state payload: {0}")]
    MalformedPayload(String),

    #[error("state field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("payload of {0} bytes exceeds the limit")]
    Oversized(usize),

    #[error("no handler for topic `{0}`")]
    UnexpectedTopic(String),
}

/// Transient broker failures. Never fatal; the connectivity machine retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker is not connected")]
    NotConnected,

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("handshake timed out after {0}ms")]
    HandshakeTimeout(u64),

    #[error("connection lost")]
    ConnectionLost,

    #[error("transport error: {0}")]
    Transport(String),
}
