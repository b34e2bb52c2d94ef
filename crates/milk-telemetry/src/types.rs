use core::fmt;
use serde::Serialize;
use serial_transport::{LinkConfig, PortEntry};

/// Which of the two sensor links a controller drives.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Composition,
    Quantity,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Composition => "composition",
            ChannelKind::Quantity => "quantity",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connected,
    Error,
}

/// Port, speed and last status line of a channel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PortInfo {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub status: String,
}

impl Default for PortInfo {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 0,
            status: STATUS_DISCONNECTED.to_string(),
        }
    }
}

pub(crate) const STATUS_CONNECTED: &str = "Connected";
pub(crate) const STATUS_DISCONNECTED: &str = "Disconnected";

impl PortInfo {
    pub(crate) fn connected(config: &LinkConfig) -> Self {
        Self {
            port: Some(config.port.clone()),
            baud_rate: config.baud_rate,
            status: STATUS_CONNECTED.to_string(),
        }
    }

    pub(crate) fn failed(config: &LinkConfig, message: &str) -> Self {
        Self {
            port: Some(config.port.clone()),
            baud_rate: config.baud_rate,
            status: format!("Error: {message}"),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.starts_with("Error:")
    }
}

/// Point-in-time view of one channel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ChannelStatus {
    pub channel: ChannelKind,
    pub state: ChannelState,
    pub connected: bool,
    pub info: PortInfo,
}

/// Result of a connect request, shaped for direct JSON responses.
#[derive(Clone, Debug, Serialize)]
pub struct ConnectOutcome {
    pub success: bool,
    pub message: String,
    pub info: PortInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub(crate) fn disconnected() -> Self {
        Self {
            success: true,
            message: STATUS_DISCONNECTED.to_string(),
        }
    }
}

/// Decoded milk analyser reading. Density stays as the device's digit text.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompositionSample {
    pub fat: f64,
    pub snf: f64,
    pub density: String,
    pub added_water: f64,
    pub protein: f64,
    pub raw: String,
}

/// A composition sample as queued for pollers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompositionReading {
    pub time: String,
    pub raw_data: String,
    pub parsed: CompositionSample,
}

/// A flow meter reading in liters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuantitySample {
    pub time: String,
    pub raw_data: String,
    pub parsed: f64,
}

/// Everything a poller wants in one round trip: both drains and both statuses.
#[derive(Clone, Debug, Serialize)]
pub struct DataSnapshot {
    pub connected: bool,
    pub data: Vec<CompositionReading>,
    pub port_info: PortInfo,
    pub connected_quantity: bool,
    pub quantity_data: Option<QuantitySample>,
    pub port_info_quantity: PortInfo,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AvailablePort {
    pub port: String,
    pub description: String,
}

impl From<PortEntry> for AvailablePort {
    fn from(entry: PortEntry) -> Self {
        Self {
            port: entry.port,
            description: entry.description,
        }
    }
}
