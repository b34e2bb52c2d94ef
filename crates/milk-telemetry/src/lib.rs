//! milk-telemetry: serial ingestion for a milk analyser and a flow meter
//!
//! Two [`ChannelController`]s each own one serial link and a background read
//! loop that decodes device output into samples. Pollers drain the samples
//! through [`TelemetryHub`]: composition readings are delivered as a full
//! backlog, flow readings as the newest value only.

mod types;
pub use types::{
    Ack, AvailablePort, ChannelKind, ChannelState, ChannelStatus, CompositionReading,
    CompositionSample, ConnectOutcome, DataSnapshot, PortInfo, QuantitySample,
};

mod error;
pub use error::{ChannelError, DeviceFault, Result};

pub mod decode;
pub use decode::{decode_composition, decode_quantity};

mod queue;
pub use queue::SampleQueue;

mod profile;
pub use profile::{ChannelProfile, Composition, Quantity};

mod channel;
pub use channel::{ChannelController, ERROR_BACKOFF, IDLE_INTERVAL};

mod registry;
pub use registry::PortRegistry;

mod metrics;
pub use metrics::{ChannelMetrics, MetricsHub};

mod hub;
pub use hub::TelemetryHub;
