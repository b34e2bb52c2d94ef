use crate::ChannelKind;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Counters for one channel, pre-bound to its `channel` label.
#[derive(Clone)]
pub struct ChannelMetrics {
    pub frames_read: IntCounter,
    pub samples_decoded: IntCounter,
    pub frames_dropped: IntCounter,
    pub read_errors: IntCounter,
    pub connected: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    frames_read: IntCounterVec,
    samples_decoded: IntCounterVec,
    frames_dropped: IntCounterVec,
    read_errors: IntCounterVec,
    connected: IntGaugeVec,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| {
            IntCounterVec::new(Opts::new(name, help), &["channel"])
                .map_err(|e| format!("metrics init error: {e}"))
        };
        let frames_read = counter("mt_frames_read_total", "Raw frames read from a serial link")?;
        let samples_decoded = counter("mt_samples_decoded_total", "Frames decoded into samples")?;
        let frames_dropped = counter("mt_frames_dropped_total", "Frames dropped as malformed")?;
        let read_errors = counter("mt_read_errors_total", "I/O errors inside a read loop")?;
        let connected = IntGaugeVec::new(
            Opts::new("mt_channel_connected", "1 while a channel holds an open link"),
            &["channel"],
        )
        .map_err(|e| format!("metrics init error: {e}"))?;

        let _ = registry.register(Box::new(frames_read.clone()));
        let _ = registry.register(Box::new(samples_decoded.clone()));
        let _ = registry.register(Box::new(frames_dropped.clone()));
        let _ = registry.register(Box::new(read_errors.clone()));
        let _ = registry.register(Box::new(connected.clone()));
        Ok(Self {
            registry,
            frames_read,
            samples_decoded,
            frames_dropped,
            read_errors,
            connected,
        })
    }

    pub fn channel(&self, kind: ChannelKind) -> ChannelMetrics {
        let label = [kind.as_str()];
        ChannelMetrics {
            frames_read: self.frames_read.with_label_values(&label),
            samples_decoded: self.samples_decoded.with_label_values(&label),
            frames_dropped: self.frames_dropped.with_label_values(&label),
            read_errors: self.read_errors.with_label_values(&label),
            connected: self.connected.with_label_values(&label),
        }
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_are_labelled_separately() {
        let hub = MetricsHub::new().unwrap();
        let comp = hub.channel(ChannelKind::Composition);
        let qty = hub.channel(ChannelKind::Quantity);
        comp.frames_read.inc();
        comp.frames_read.inc();
        qty.read_errors.inc();

        let text = hub.encode_text();
        assert!(text.contains("mt_frames_read_total{channel=\"composition\"} 2"));
        assert!(text.contains("mt_read_errors_total{channel=\"quantity\"} 1"));
    }
}
