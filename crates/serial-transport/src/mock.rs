use crate::types::take_line;
use crate::{LinkConfig, PortEntry, RawFrame, Result, SerialBackend, SerialLink, TransportError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How a mock port refuses to open.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MockOpenFailure {
    Busy,
    NotFound,
    Other(String),
}

#[derive(Default)]
struct PortState {
    rx: Vec<u8>,
    open: bool,
    opens: u32,
    refuse: Option<MockOpenFailure>,
    failing_reads: u32,
    line_stall: Option<Duration>,
    line_reads: u32,
}

/// Test-side handle to one mock port, shared with any link opened on it.
#[derive(Clone, Default)]
pub struct MockPort {
    state: Arc<Mutex<PortState>>,
}

impl MockPort {
    /// Queue raw bytes as if the device had sent them.
    pub fn feed(&self, bytes: impl AsRef<[u8]>) {
        self.state.lock().rx.extend_from_slice(bytes.as_ref());
    }

    /// Queue one line followed by `\n`.
    pub fn feed_line(&self, line: &str) {
        let mut state = self.state.lock();
        state.rx.extend_from_slice(line.as_bytes());
        state.rx.push(b'\n');
    }

    /// Make the next `count` availability checks fail with an I/O error.
    pub fn fail_reads(&self, count: u32) {
        self.state.lock().failing_reads = count;
    }

    /// Make every line read block for `stall` before looking for a
    /// terminator, like a device trickling bytes without ending the line.
    pub fn stall_lines(&self, stall: Option<Duration>) {
        self.state.lock().line_stall = stall;
    }

    /// Line reads started on links opened on this port.
    pub fn line_reads(&self) -> u32 {
        self.state.lock().line_reads
    }

    pub fn refuse_open(&self, failure: Option<MockOpenFailure>) {
        self.state.lock().refuse = failure;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn open_count(&self) -> u32 {
        self.state.lock().opens
    }

    pub fn buffered(&self) -> usize {
        self.state.lock().rx.len()
    }
}

/// A simple in-process backend. Each backend instance is independent.
#[derive(Clone, Default)]
pub struct MockBackend {
    ports: Arc<Mutex<BTreeMap<String, MockPort>>>,
    list_failure: Arc<Mutex<Option<String>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports(names: &[&str]) -> Self {
        let backend = Self::new();
        for name in names {
            backend.add_port(*name);
        }
        backend
    }

    /// Register a port, or return the existing handle if the name is taken.
    pub fn add_port(&self, name: impl Into<String>) -> MockPort {
        self.ports.lock().entry(name.into()).or_default().clone()
    }

    pub fn port(&self, name: &str) -> Option<MockPort> {
        self.ports.lock().get(name).cloned()
    }

    /// Make enumeration fail with `message` until cleared with `None`.
    pub fn fail_listing(&self, message: Option<String>) {
        *self.list_failure.lock() = message;
    }
}

impl SerialBackend for MockBackend {
    fn list(&self) -> Result<Vec<PortEntry>> {
        if let Some(msg) = self.list_failure.lock().clone() {
            return Err(TransportError::Io(msg));
        }
        Ok(self.ports.lock().keys().map(PortEntry::plain).collect())
    }

    fn open(&self, config: &LinkConfig) -> Result<Box<dyn SerialLink>> {
        let name = &config.port;
        let port = self.port(name).ok_or_else(|| {
            TransportError::PortNotFound(format!("could not open {name}: no such mock port"))
        })?;
        {
            let mut state = port.state.lock();
            match &state.refuse {
                Some(MockOpenFailure::Busy) => {
                    return Err(TransportError::PortBusy(format!("{name}: access is denied")))
                }
                Some(MockOpenFailure::NotFound) => {
                    return Err(TransportError::PortNotFound(format!(
                        "could not open {name}: device removed"
                    )))
                }
                Some(MockOpenFailure::Other(msg)) => return Err(TransportError::Io(msg.clone())),
                None => {}
            }
            if state.open {
                return Err(TransportError::PortBusy(format!("{name}: already in use")));
            }
            state.open = true;
            state.opens += 1;
        }
        Ok(Box::new(MockLink {
            name: name.clone(),
            port,
        }))
    }
}

struct MockLink {
    name: String,
    port: MockPort,
}

impl SerialLink for MockLink {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let mut state = self.port.state.lock();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(TransportError::Io("injected read failure".to_string()));
        }
        Ok(state.rx.len())
    }

    fn read_existing(&mut self) -> Result<RawFrame> {
        let bytes = std::mem::take(&mut self.port.state.lock().rx);
        Ok(RawFrame::now(String::from_utf8_lossy(&bytes)))
    }

    fn read_line(&mut self) -> Result<RawFrame> {
        let stall = {
            let mut state = self.port.state.lock();
            state.line_reads += 1;
            state.line_stall
        };
        if let Some(stall) = stall {
            thread::sleep(stall);
        }
        // A partial line stays buffered, as on real hardware after a timeout
        take_line(&mut self.port.state.lock().rx)
            .map(RawFrame::now)
            .ok_or(TransportError::Timeout)
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.port.state.lock().open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_is_sorted_by_name() -> anyhow::Result<()> {
        let backend = MockBackend::with_ports(&["ttyS1", "ttyS0"]);
        let names: Vec<String> = backend.list()?.into_iter().map(|p| p.port).collect();
        assert_eq!(names, vec!["ttyS0", "ttyS1"]);
        Ok(())
    }

    #[test]
    fn test_open_unknown_port_is_not_found() {
        let backend = MockBackend::new();
        let err = backend.open(&LinkConfig::new("nope", 9600)).err();
        assert!(matches!(err, Some(TransportError::PortNotFound(_))));
    }

    #[test]
    fn test_second_open_is_busy_until_drop() -> anyhow::Result<()> {
        let backend = MockBackend::with_ports(&["ttyS0"]);
        let cfg = LinkConfig::new("ttyS0", 9600);
        let link = backend.open(&cfg)?;
        assert!(matches!(
            backend.open(&cfg).err(),
            Some(TransportError::PortBusy(_))
        ));
        drop(link);
        let port = backend.port("ttyS0").ok_or_else(|| anyhow::anyhow!("missing"))?;
        assert!(!port.is_open());
        let _again = backend.open(&cfg)?;
        assert_eq!(port.open_count(), 2);
        Ok(())
    }

    #[test]
    fn test_refused_open_reports_reason() {
        let backend = MockBackend::with_ports(&["COM4"]);
        if let Some(port) = backend.port("COM4") {
            port.refuse_open(Some(MockOpenFailure::Busy));
        }
        let err = backend.open(&LinkConfig::new("COM4", 2400)).err();
        assert!(matches!(err, Some(TransportError::PortBusy(_))));
    }

    #[test]
    fn test_read_line_and_existing() -> anyhow::Result<()> {
        let backend = MockBackend::new();
        let port = backend.add_port("COM1");
        let mut link = backend.open(&LinkConfig::new("COM1", 9600))?;

        port.feed_line("0125");
        port.feed("12.");
        assert_eq!(link.bytes_to_read()?, 8);
        assert_eq!(link.read_line()?.text, "0125");
        assert!(matches!(link.read_line(), Err(TransportError::Timeout)));
        assert_eq!(link.read_existing()?.text, "12.");
        assert_eq!(link.bytes_to_read()?, 0);
        Ok(())
    }

    #[test]
    fn test_stalled_line_read_blocks_then_times_out() -> anyhow::Result<()> {
        let backend = MockBackend::new();
        let port = backend.add_port("COM2");
        let mut link = backend.open(&LinkConfig::new("COM2", 9600))?;
        port.stall_lines(Some(Duration::from_millis(150)));
        port.feed("12");

        let started = std::time::Instant::now();
        assert!(matches!(link.read_line(), Err(TransportError::Timeout)));
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(port.line_reads(), 1);
        assert_eq!(port.buffered(), 2);
        Ok(())
    }

    #[test]
    fn test_injected_failures_are_consumed() -> anyhow::Result<()> {
        let backend = MockBackend::new();
        let port = backend.add_port("COM1");
        let mut link = backend.open(&LinkConfig::new("COM1", 9600))?;
        port.fail_reads(1);
        assert!(matches!(link.bytes_to_read(), Err(TransportError::Io(_))));
        assert_eq!(link.bytes_to_read()?, 0);
        Ok(())
    }

    #[test]
    fn test_listing_failure() {
        let backend = MockBackend::with_ports(&["COM1"]);
        backend.fail_listing(Some("enumeration failed".into()));
        assert!(backend.list().is_err());
        backend.fail_listing(None);
        assert!(backend.list().is_ok());
    }
}
