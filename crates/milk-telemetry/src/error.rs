use crate::ChannelKind;
use serde::Serialize;
use serial_transport::TransportError;
use thiserror::Error;

pub type Result<T, E = ChannelError> = core::result::Result<T, E>;

/// Why a device could not be opened.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFault {
    Busy,
    NotFound,
    Other,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("{channel} channel is already connected")]
    ConnectionBusy { channel: ChannelKind },
    #[error("{message}")]
    DeviceUnavailable {
        port: String,
        fault: DeviceFault,
        message: String,
    },
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("transient I/O error: {0}")]
    TransientIo(#[from] TransportError),
    #[error("metrics init error: {0}")]
    Metrics(String),
}

impl ChannelError {
    /// Stable machine-readable tag for callers that map errors to responses.
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::InvalidConfiguration(_) => "invalid_configuration",
            ChannelError::ConnectionBusy { .. } => "connection_busy",
            ChannelError::DeviceUnavailable { .. } => "device_unavailable",
            ChannelError::MalformedFrame(_) => "malformed_frame",
            ChannelError::TransientIo(_) => "transient_io",
            ChannelError::Metrics(_) => "metrics",
        }
    }

    /// Turn an open failure into a categorized, human-readable error.
    pub(crate) fn from_open_failure(port: &str, err: TransportError) -> Self {
        let (fault, message) = match err {
            TransportError::PortBusy(_) => (
                DeviceFault::Busy,
                "Port is in use or inaccessible.".to_string(),
            ),
            TransportError::PortNotFound(msg) => {
                (DeviceFault::NotFound, format!("Port not found. {msg}"))
            }
            TransportError::Io(msg) => (DeviceFault::Other, msg),
            TransportError::Timeout => (DeviceFault::Other, "timed out opening port".to_string()),
        };
        ChannelError::DeviceUnavailable {
            port: port.to_string(),
            fault,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_open_failure_message() {
        let err = ChannelError::from_open_failure(
            "COM3",
            TransportError::PortBusy("COM3: access is denied".into()),
        );
        assert_eq!(err.to_string(), "Port is in use or inaccessible.");
        assert_eq!(err.code(), "device_unavailable");
        assert!(matches!(
            err,
            ChannelError::DeviceUnavailable {
                fault: DeviceFault::Busy,
                ..
            }
        ));
    }

    #[test]
    fn test_not_found_open_failure_keeps_driver_text() {
        let err = ChannelError::from_open_failure(
            "COM9",
            TransportError::PortNotFound("could not open COM9".into()),
        );
        assert_eq!(err.to_string(), "Port not found. could not open COM9");
    }

    #[test]
    fn test_busy_channel_message() {
        let err = ChannelError::ConnectionBusy {
            channel: ChannelKind::Quantity,
        };
        assert_eq!(err.to_string(), "quantity channel is already connected");
        assert_eq!(err.code(), "connection_busy");
    }
}
