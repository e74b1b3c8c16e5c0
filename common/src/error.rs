use thiserror::Error;

use crate::magic_packet::MacAddress;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WolError {
    #[error("invalid MAC address format: {0:?}")]
    InvalidMacFormat(String),
    #[error("missing required configuration field `{0}`")]
    ConfigurationMissing(&'static str),
    #[error("malformed configuration: {0}")]
    ConfigurationMalformed(String),
    #[error("timer duration must be greater than zero")]
    InvalidDuration,
    /// Not a failure as such: callers fall back to relative rendering.
    #[error("system clock is not synchronized yet")]
    ClockUnsynchronized,
    #[error("failed to send magic packet to {mac}: {reason}")]
    SendFailure { mac: MacAddress, reason: String },
}
