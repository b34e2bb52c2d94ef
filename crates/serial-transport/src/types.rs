use core::fmt;
use std::time::Duration;
use time::OffsetDateTime;

/// Upper bound on a single blocking read, including a whole line read.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Bytes buffered while waiting for a line terminator before they are dropped.
pub const MAX_LINE_LEN: usize = 4096;

/// Port name and speed for one link. Framing is fixed at 8N1.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct LinkConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl LinkConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
        }
    }
}

impl fmt::Display for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} 8N1", self.port, self.baud_rate)
    }
}

/// A host-visible serial device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortEntry {
    pub port: String,
    pub description: String,
}

impl PortEntry {
    pub fn plain(port: impl Into<String>) -> Self {
        let port = port.into();
        let description = format!("{port} - Serial Port");
        Self { port, description }
    }
}

/// Text exactly as it came off the wire, stamped on arrival.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawFrame {
    pub received_at: OffsetDateTime,
    pub text: String,
}

impl RawFrame {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            received_at: OffsetDateTime::now_utc(),
            text: text.into(),
        }
    }

    /// RFC 3339 rendering of the arrival time, empty if formatting fails.
    pub fn timestamp(&self) -> String {
        self.received_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default()
    }
}

/// Remove the first `\n`-terminated line from `pending`, without the terminator.
pub(crate) fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let pos = pending.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = pending.drain(..=pos).collect();
    Some(String::from_utf8_lossy(&line[..pos]).into_owned())
}
