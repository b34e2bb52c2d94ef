use crate::metrics::ChannelMetrics;
use crate::profile::ChannelProfile;
use crate::types::{STATUS_CONNECTED, STATUS_DISCONNECTED};
use crate::{
    ChannelError, ChannelKind, ChannelState, ChannelStatus, DeviceFault, PortInfo, Result,
    SampleQueue,
};
use parking_lot::Mutex;
use serial_transport::{LinkConfig, RawFrame, SerialBackend, SerialLink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause between polls of a link, idle or not.
pub const IDLE_INTERVAL: Duration = Duration::from_millis(100);
/// Pause after a failed read before trying again.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);

struct StatusCell {
    state: ChannelState,
    info: PortInfo,
}

/// State shared between a controller and its read loop.
struct Shared<T> {
    kind: ChannelKind,
    connected: AtomicBool,
    status: Mutex<StatusCell>,
    link: Mutex<Option<Box<dyn SerialLink>>>,
    queue: SampleQueue<T>,
    metrics: ChannelMetrics,
}

struct ReadLoop {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns one serial link, its background read loop and its sample queue.
///
/// A controller lives for the whole process and can be connected and
/// disconnected any number of times. All methods take `&self`, so a controller
/// can sit behind an `Arc` shared by request handlers.
pub struct ChannelController<P: ChannelProfile> {
    backend: Arc<dyn SerialBackend>,
    shared: Arc<Shared<P::Sample>>,
    // Held for the whole of connect/disconnect so they never interleave
    reader: Mutex<Option<ReadLoop>>,
}

impl<P: ChannelProfile> ChannelController<P> {
    pub fn new(backend: Arc<dyn SerialBackend>, metrics: ChannelMetrics) -> Self {
        Self {
            backend,
            shared: Arc::new(Shared {
                kind: P::KIND,
                connected: AtomicBool::new(false),
                status: Mutex::new(StatusCell {
                    state: ChannelState::Disconnected,
                    info: PortInfo::default(),
                }),
                link: Mutex::new(None),
                queue: SampleQueue::new(),
                metrics,
            }),
            reader: Mutex::new(None),
        }
    }

    /// Open `port` at `baud_rate` (8N1) and start the read loop.
    ///
    /// Fails without touching the current connection when already connected.
    pub fn connect(&self, port: &str, baud_rate: i64) -> Result<PortInfo> {
        let config = validate(port, baud_rate)?;
        let mut reader = self.reader.lock();
        if self.shared.connected.load(Ordering::Acquire) {
            warn!(channel = %P::KIND, port = %config.port, "connect rejected: already connected");
            return Err(ChannelError::ConnectionBusy { channel: P::KIND });
        }

        let link = match self.backend.open(&config) {
            Ok(link) => link,
            Err(e) => {
                let err = ChannelError::from_open_failure(&config.port, e);
                error!(
                    channel = %P::KIND,
                    port = %config.port,
                    baud = config.baud_rate,
                    error = %err,
                    "serial connection failed"
                );
                self.shared
                    .set_status(ChannelState::Error, PortInfo::failed(&config, &err.to_string()));
                return Err(err);
            }
        };
        *self.shared.link.lock() = Some(link);
        self.shared.connected.store(true, Ordering::Release);
        let info = PortInfo::connected(&config);
        self.shared.set_status(ChannelState::Connected, info.clone());

        let (stop_tx, stop_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("mt-{}-reader", P::KIND))
            .spawn(move || read_loop::<P>(&shared, &stop_rx));
        match spawned {
            Ok(handle) => {
                *reader = Some(ReadLoop {
                    stop: stop_tx,
                    handle,
                });
                self.shared.metrics.connected.set(1);
                info!(channel = %P::KIND, port = %config.port, baud = config.baud_rate, "connected");
                Ok(info)
            }
            Err(e) => {
                self.shared.connected.store(false, Ordering::Release);
                drop(self.shared.link.lock().take());
                let err = ChannelError::DeviceUnavailable {
                    port: config.port.clone(),
                    fault: DeviceFault::Other,
                    message: format!("could not start read loop: {e}"),
                };
                error!(channel = %P::KIND, error = %err, "serial connection failed");
                self.shared
                    .set_status(ChannelState::Error, PortInfo::failed(&config, &err.to_string()));
                Err(err)
            }
        }
    }

    /// Stop the read loop and close the link. Does nothing when already
    /// disconnected.
    pub fn disconnect(&self) {
        let mut reader = self.reader.lock();
        // Clear the flag before the link goes away so the loop never reads a
        // half-closed handle
        let was_connected = self.shared.connected.swap(false, Ordering::AcqRel);
        let worker = reader.take();
        if let Some(w) = &worker {
            let _ = w.stop.send(());
        }
        // Waits out a read in progress, which the link's timeout bounds
        if let Some(link) = self.shared.link.lock().take() {
            debug!(channel = %P::KIND, port = link.port_name(), "closing serial link");
        }
        if let Some(w) = worker {
            if w.handle.join().is_err() {
                error!(channel = %P::KIND, "read loop panicked");
            }
        }
        self.shared.metrics.connected.set(0);

        let mut status = self.shared.status.lock();
        if status.state != ChannelState::Disconnected {
            status.state = ChannelState::Disconnected;
            status.info.status = STATUS_DISCONNECTED.to_string();
        }
        if was_connected {
            info!(channel = %P::KIND, port = ?status.info.port, "disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ChannelStatus {
        let status = self.shared.status.lock();
        ChannelStatus {
            channel: P::KIND,
            state: status.state,
            connected: self.is_connected(),
            info: status.info.clone(),
        }
    }

    pub fn port_info(&self) -> PortInfo {
        self.shared.status.lock().info.clone()
    }

    /// Drain the queue with this channel's delivery policy.
    pub fn take_samples(&self) -> P::Batch {
        P::take(&self.shared.queue)
    }

    /// Samples waiting for the next poll.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }
}

impl<P: ChannelProfile> Drop for ChannelController<P> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn validate(port: &str, baud_rate: i64) -> Result<LinkConfig> {
    let port = port.trim();
    if port.is_empty() {
        return Err(ChannelError::InvalidConfiguration(
            "port name is empty".to_string(),
        ));
    }
    if baud_rate <= 0 {
        return Err(ChannelError::InvalidConfiguration(format!(
            "baud rate must be positive, got {baud_rate}"
        )));
    }
    let baud_rate = u32::try_from(baud_rate).map_err(|_| {
        ChannelError::InvalidConfiguration(format!("baud rate {baud_rate} is out of range"))
    })?;
    Ok(LinkConfig::new(port, baud_rate))
}

impl<T> Shared<T> {
    fn set_status(&self, state: ChannelState, info: PortInfo) {
        let mut status = self.status.lock();
        status.state = state;
        status.info = info;
    }

    fn record_fault(&self, err: &ChannelError) {
        self.metrics.read_errors.inc();
        warn!(channel = %self.kind, error = %err, "serial read failed, backing off");
        let mut status = self.status.lock();
        if self.connected.load(Ordering::Acquire) {
            status.info.status = format!("Error: {err}");
        }
    }

    fn clear_fault(&self) {
        let mut status = self.status.lock();
        if self.connected.load(Ordering::Acquire) && status.info.is_error() {
            status.info.status = STATUS_CONNECTED.to_string();
        }
    }
}

enum Poll {
    Idle,
    Read,
    Failed,
    Closed,
}

fn read_loop<P: ChannelProfile>(shared: &Shared<P::Sample>, stop: &Receiver<()>) {
    debug!(channel = %P::KIND, "read loop started");
    while shared.connected.load(Ordering::Acquire) {
        let pause = match poll_link::<P>(shared) {
            Poll::Closed => break,
            Poll::Idle | Poll::Read => IDLE_INTERVAL,
            Poll::Failed => ERROR_BACKOFF,
        };
        match stop.recv_timeout(pause) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(channel = %P::KIND, "read loop stopped");
}

fn poll_link<P: ChannelProfile>(shared: &Shared<P::Sample>) -> Poll {
    let read = {
        let mut guard = shared.link.lock();
        let Some(link) = guard.as_mut() else {
            return Poll::Closed;
        };
        match link.bytes_to_read() {
            Ok(0) => return Poll::Idle,
            Ok(_) => P::read_frame(&mut **link),
            Err(e) => Err(e),
        }
    };
    match read {
        Ok(frame) => {
            shared.clear_fault();
            ingest::<P>(shared, &frame);
            Poll::Read
        }
        Err(e) => {
            shared.record_fault(&ChannelError::from(e));
            Poll::Failed
        }
    }
}

fn ingest<P: ChannelProfile>(shared: &Shared<P::Sample>, frame: &RawFrame) {
    shared.metrics.frames_read.inc();
    match P::decode(frame) {
        Ok(sample) => {
            shared.queue.push(sample);
            shared.metrics.samples_decoded.inc();
        }
        Err(e) => {
            shared.metrics.frames_dropped.inc();
            debug!(channel = %P::KIND, error = %e, raw = ?frame.text, "dropping frame");
        }
    }
}
