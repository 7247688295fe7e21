//! User-facing failures of the remote-control session.
//!
//! Every variant ends up in an acknowledgment dialog; none of them stops the
//! application.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Bluetooth is off or missing.
    #[error("{0}")]
    TransportUnavailable(String),

    #[error("Failed to connect")]
    ConnectTimeout,

    /// The transport refused or dropped the connection before it became ready.
    #[error("Failed to connect")]
    ConnectFailed,

    /// An established link went away.
    #[error("Device disconnected")]
    Disconnected,

    /// Tuning input that the device would not understand.
    #[error("{0}")]
    Validation(String),

    /// The request needs a ready link.
    #[error("{0}")]
    OperationRejected(String),
}

impl SessionError {
    pub fn bluetooth_not_enabled() -> Self {
        Self::TransportUnavailable("Bluetooth not turned on".to_string())
    }

    pub fn bluetooth_turned_off() -> Self {
        Self::TransportUnavailable("Bluetooth turned off".to_string())
    }

    pub fn device_not_ready() -> Self {
        Self::OperationRejected("Device not ready".to_string())
    }

    /// Dialog title.
    pub fn title(&self) -> &'static str {
        "Problem"
    }
}
