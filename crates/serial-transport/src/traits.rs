use crate::{LinkConfig, PortEntry, RawFrame, Result};

/// Opens links and enumerates the ports a host exposes.
pub trait SerialBackend: Send + Sync {
    /// Attempt to list available ports for this backend.
    fn list(&self) -> Result<Vec<PortEntry>>;

    /// Open a port with fixed 8N1 framing and a one second read timeout.
    fn open(&self, config: &LinkConfig) -> Result<Box<dyn SerialLink>>;
}

/// One open serial port. Dropping the link closes the device.
pub trait SerialLink: Send {
    fn port_name(&self) -> &str;

    /// Bytes that can be read right now without blocking.
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Read everything currently buffered.
    fn read_existing(&mut self) -> Result<RawFrame>;

    /// Read one `\n`-terminated line, blocking up to the read timeout.
    /// The terminator is stripped; a trailing `\r` is kept.
    fn read_line(&mut self) -> Result<RawFrame>;
}
