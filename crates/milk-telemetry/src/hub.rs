use crate::profile::{Composition, Quantity};
use crate::{
    Ack, AvailablePort, ChannelController, ChannelError, ChannelKind, ChannelStatus,
    CompositionReading, ConnectOutcome, DataSnapshot, MetricsHub, PortInfo, PortRegistry,
    QuantitySample, Result,
};
use serial_transport::SerialBackend;
use std::sync::Arc;

/// The surface request handlers call: both channels, port listing and metrics.
///
/// Every method takes `&self`; wrap the hub in an `Arc` to share it.
pub struct TelemetryHub {
    registry: PortRegistry,
    composition: ChannelController<Composition>,
    quantity: ChannelController<Quantity>,
    metrics: MetricsHub,
}

impl TelemetryHub {
    pub fn new(backend: Arc<dyn SerialBackend>) -> Result<Self> {
        let metrics = MetricsHub::new().map_err(ChannelError::Metrics)?;
        Ok(Self {
            registry: PortRegistry::new(Arc::clone(&backend)),
            composition: ChannelController::new(
                Arc::clone(&backend),
                metrics.channel(ChannelKind::Composition),
            ),
            quantity: ChannelController::new(backend, metrics.channel(ChannelKind::Quantity)),
            metrics,
        })
    }

    /// A hub over the host's real serial ports.
    #[cfg(feature = "native")]
    pub fn native() -> Result<Self> {
        Self::new(Arc::new(serial_transport::NativeBackend))
    }

    pub fn connect(&self, port: &str, baud_rate: i64) -> ConnectOutcome {
        outcome(self.composition.connect(port, baud_rate), || self.composition.port_info())
    }

    pub fn disconnect(&self) -> Ack {
        self.composition.disconnect();
        Ack::disconnected()
    }

    pub fn connect_quantity(&self, port: &str, baud_rate: i64) -> ConnectOutcome {
        outcome(self.quantity.connect(port, baud_rate), || self.quantity.port_info())
    }

    pub fn disconnect_quantity(&self) -> Ack {
        self.quantity.disconnect();
        Ack::disconnected()
    }

    /// Every composition sample since the last call, oldest first.
    pub fn get_data(&self) -> Vec<CompositionReading> {
        self.composition.take_samples()
    }

    /// The newest flow reading since the last call; older ones are discarded.
    pub fn get_quantity_data(&self) -> Option<QuantitySample> {
        self.quantity.take_samples()
    }

    pub fn get_status(&self) -> ChannelStatus {
        self.composition.status()
    }

    pub fn get_status_quantity(&self) -> ChannelStatus {
        self.quantity.status()
    }

    pub fn list_ports(&self) -> Vec<AvailablePort> {
        self.registry.list_ports()
    }

    /// Drain both channels and report both statuses in one call.
    pub fn poll(&self) -> DataSnapshot {
        let data = self.get_data();
        let quantity_data = self.get_quantity_data();
        let composition = self.get_status();
        let quantity = self.get_status_quantity();
        DataSnapshot {
            connected: composition.connected,
            data,
            port_info: composition.info,
            connected_quantity: quantity.connected,
            quantity_data,
            port_info_quantity: quantity.info,
        }
    }

    pub fn composition(&self) -> &ChannelController<Composition> {
        &self.composition
    }

    pub fn quantity(&self) -> &ChannelController<Quantity> {
        &self.quantity
    }

    /// Prometheus text exposition of the ingest counters.
    pub fn metrics_text(&self) -> String {
        self.metrics.encode_text()
    }
}

fn outcome(result: Result<PortInfo>, current: impl FnOnce() -> PortInfo) -> ConnectOutcome {
    match result {
        Ok(info) => ConnectOutcome {
            success: true,
            message: info.status.clone(),
            info,
            error: None,
        },
        Err(err) => ConnectOutcome {
            success: false,
            message: match &err {
                ChannelError::ConnectionBusy { .. } => "Already connected".to_string(),
                other => other.to_string(),
            },
            info: current(),
            error: Some(err.code()),
        },
    }
}
