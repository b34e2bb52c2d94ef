use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("port not found: {0}")]
    PortNotFound(String),
    #[error("port is in use or inaccessible: {0}")]
    PortBusy(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("timeout")]
    Timeout,
}

/// Sort an open failure into busy / not-found / other from the driver's message.
///
/// Host drivers report the same condition with different wording, so matching is
/// case-insensitive and substring based.
pub fn classify_open_failure(message: impl Into<String>) -> TransportError {
    let message = message.into();
    let lower = message.to_ascii_lowercase();
    const BUSY: [&str; 5] = [
        "access is denied",
        "already in use",
        "permission denied",
        "resource busy",
        "locked",
    ];
    const MISSING: [&str; 5] = [
        "could not open",
        "no such file",
        "not found",
        "cannot find",
        "no such device",
    ];
    if BUSY.iter().any(|needle| lower.contains(needle)) {
        TransportError::PortBusy(message)
    } else if MISSING.iter().any(|needle| lower.contains(needle)) {
        TransportError::PortNotFound(message)
    } else {
        TransportError::Io(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_access_denied_is_busy() {
        let err = classify_open_failure("Access is denied. (os error 5)");
        assert!(matches!(err, TransportError::PortBusy(_)));
    }

    #[test]
    fn test_linux_busy_is_busy() {
        let err = classify_open_failure("Device or resource busy");
        assert!(matches!(err, TransportError::PortBusy(_)));
    }

    #[test]
    fn test_missing_device_is_not_found() {
        let err = classify_open_failure("No such file or directory");
        assert!(matches!(err, TransportError::PortNotFound(_)));

        let err = classify_open_failure("could not open port 'COM7'");
        assert!(matches!(err, TransportError::PortNotFound(_)));
    }

    #[test]
    fn test_unknown_message_is_io() {
        match classify_open_failure("baud rate not supported") {
            TransportError::Io(msg) => assert_eq!(msg, "baud rate not supported"),
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
