use crate::types::take_line;
use crate::{
    classify_open_failure, LinkConfig, PortEntry, RawFrame, Result, SerialBackend, SerialLink,
    TransportError, MAX_LINE_LEN, READ_TIMEOUT,
};
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{ErrorKind, Read};
use std::time::Instant;
use tracing::{debug, warn};

/// Host serial ports through the `serialport` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeBackend;

impl SerialBackend for NativeBackend {
    fn list(&self) -> Result<Vec<PortEntry>> {
        let ports = serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))?;
        let mut out = Vec::with_capacity(ports.len());
        for p in ports {
            let description = match &p.port_type {
                SerialPortType::UsbPort(info) => format!(
                    "{} - USB Serial Port ({:04X}:{:04X})",
                    p.port_name, info.vid, info.pid
                ),
                SerialPortType::PciPort => format!("{} - PCI Serial Port", p.port_name),
                SerialPortType::BluetoothPort => {
                    format!("{} - Bluetooth Serial Port", p.port_name)
                }
                SerialPortType::Unknown => format!("{} - Serial Port", p.port_name),
            };
            out.push(PortEntry {
                port: p.port_name,
                description,
            });
        }
        Ok(out)
    }

    fn open(&self, config: &LinkConfig) -> Result<Box<dyn SerialLink>> {
        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| map_open_error(&config.port, e))?;
        debug!(port = %config.port, baud = config.baud_rate, "serial port opened");
        Ok(Box::new(NativeLink {
            name: config.port.clone(),
            port,
            pending: Vec::with_capacity(128),
        }))
    }
}

/// An open host serial port.
pub struct NativeLink {
    name: String,
    port: Box<dyn SerialPort>,
    // Bytes read past the last line terminator
    pending: Vec<u8>,
}

impl SerialLink for NativeLink {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let queued = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(queued as usize + self.pending.len())
    }

    fn read_existing(&mut self) -> Result<RawFrame> {
        let queued = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::Io(e.to_string()))? as usize;
        let mut bytes = std::mem::take(&mut self.pending);
        if queued > 0 {
            let start = bytes.len();
            bytes.resize(start + queued, 0);
            match self.port.read(&mut bytes[start..]) {
                Ok(n) => bytes.truncate(start + n),
                Err(e) => {
                    bytes.truncate(start);
                    self.pending = bytes;
                    return Err(map_read_error(e));
                }
            }
        }
        Ok(RawFrame::now(String::from_utf8_lossy(&bytes)))
    }

    fn read_line(&mut self) -> Result<RawFrame> {
        let result = self.read_line_until(Instant::now() + READ_TIMEOUT);
        if let Err(e) = self.port.set_timeout(READ_TIMEOUT) {
            debug!(port = %self.name, error = %e, "could not restore read timeout");
        }
        result
    }
}

impl NativeLink {
    // Partial bytes stay in `pending` on timeout
    fn read_line_until(&mut self, deadline: Instant) -> Result<RawFrame> {
        let mut buf = [0u8; 128];
        loop {
            if let Some(line) = take_line(&mut self.pending) {
                return Ok(RawFrame::now(line));
            }
            if self.pending.len() > MAX_LINE_LEN {
                warn!(
                    port = %self.name,
                    dropped = self.pending.len(),
                    "no line terminator, discarding buffered bytes"
                );
                self.pending.clear();
                return Err(TransportError::Io(format!(
                    "no line terminator within {MAX_LINE_LEN} bytes"
                )));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout);
            }
            self.port
                .set_timeout(remaining)
                .map_err(|e| TransportError::Io(e.to_string()))?;
            match self.port.read(&mut buf) {
                Ok(0) => return Err(TransportError::Timeout),
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) => return Err(map_read_error(e)),
            }
        }
    }
}

fn map_open_error(port: &str, err: serialport::Error) -> TransportError {
    match err.kind() {
        serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(ErrorKind::NotFound) => {
            TransportError::PortNotFound(format!("could not open {port}: {err}"))
        }
        serialport::ErrorKind::Io(ErrorKind::PermissionDenied) => {
            TransportError::PortBusy(format!("{port}: {err}"))
        }
        _ => classify_open_failure(format!("{port}: {err}")),
    }
}

fn map_read_error(err: std::io::Error) -> TransportError {
    if err.kind() == ErrorKind::TimedOut {
        TransportError::Timeout
    } else {
        TransportError::Io(err.to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serialport::TTYPort;
    use std::io::Write;
    use std::thread;
    use std::time::Duration;

    // Master side of a pseudo terminal plus a link opened on its slave side
    fn pty_link() -> anyhow::Result<(TTYPort, Box<dyn SerialLink>)> {
        let (master, slave) = TTYPort::pair()?;
        let name = slave
            .name()
            .ok_or_else(|| anyhow::anyhow!("pty has no name"))?;
        drop(slave);
        let link = NativeBackend.open(&LinkConfig::new(name, 9600))?;
        Ok((master, link))
    }

    #[test]
    fn test_read_line_is_bounded_while_bytes_trickle() -> anyhow::Result<()> {
        let (mut master, mut link) = pty_link()?;
        let writer = thread::spawn(move || {
            for _ in 0..15 {
                if master.write_all(b"1").is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(200));
            }
            master
        });

        let started = Instant::now();
        let result = link.read_line();
        let elapsed = started.elapsed();
        assert!(matches!(result, Err(TransportError::Timeout)), "{result:?}");
        assert!(
            elapsed < READ_TIMEOUT + Duration::from_millis(500),
            "read_line took {elapsed:?}"
        );
        let _master = writer.join();
        Ok(())
    }

    #[test]
    fn test_read_existing_returns_bytes_left_after_a_line() -> anyhow::Result<()> {
        let (mut master, mut link) = pty_link()?;
        master.write_all(b"0125\n12.")?;
        master.flush()?;
        thread::sleep(Duration::from_millis(100));

        assert_eq!(link.read_line()?.text, "0125");
        assert_eq!(link.bytes_to_read()?, 3);
        assert_eq!(link.read_existing()?.text, "12.");
        assert_eq!(link.bytes_to_read()?, 0);
        Ok(())
    }

    #[test]
    fn test_overlong_line_is_discarded() -> anyhow::Result<()> {
        let (mut master, mut link) = pty_link()?;
        let writer = thread::spawn(move || {
            let _ = master.write_all(&[b'7'; MAX_LINE_LEN + 512]);
            master
        });

        let result = link.read_line();
        assert!(matches!(result, Err(TransportError::Io(_))), "{result:?}");
        let _master = writer.join();
        Ok(())
    }
}
