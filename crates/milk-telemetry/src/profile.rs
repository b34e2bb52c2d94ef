use crate::decode::{parse_composition, parse_quantity};
use crate::{ChannelKind, CompositionReading, QuantitySample, Result, SampleQueue};
use serial_transport::{RawFrame, SerialLink};

/// Per-sensor behavior plugged into a [`crate::ChannelController`]: how a frame is
/// read off the link, how it decodes, and how pollers drain the queue.
pub trait ChannelProfile: Send + Sync + 'static {
    type Sample: Send + 'static;
    type Batch;

    const KIND: ChannelKind;

    fn read_frame(link: &mut dyn SerialLink) -> serial_transport::Result<RawFrame>;

    fn decode(frame: &RawFrame) -> Result<Self::Sample>;

    fn take(queue: &SampleQueue<Self::Sample>) -> Self::Batch;
}

/// Milk analyser: reads whatever is buffered, pollers get the full backlog.
pub enum Composition {}

/// Flow meter: reads one line at a time, pollers get only the newest reading.
pub enum Quantity {}

impl ChannelProfile for Composition {
    type Sample = CompositionReading;
    type Batch = Vec<CompositionReading>;

    const KIND: ChannelKind = ChannelKind::Composition;

    fn read_frame(link: &mut dyn SerialLink) -> serial_transport::Result<RawFrame> {
        link.read_existing()
    }

    fn decode(frame: &RawFrame) -> Result<CompositionReading> {
        let parsed = parse_composition(&frame.text)?;
        Ok(CompositionReading {
            time: frame.timestamp(),
            raw_data: frame.text.clone(),
            parsed,
        })
    }

    fn take(queue: &SampleQueue<CompositionReading>) -> Vec<CompositionReading> {
        queue.drain_all()
    }
}

impl ChannelProfile for Quantity {
    type Sample = QuantitySample;
    type Batch = Option<QuantitySample>;

    const KIND: ChannelKind = ChannelKind::Quantity;

    fn read_frame(link: &mut dyn SerialLink) -> serial_transport::Result<RawFrame> {
        link.read_line()
    }

    fn decode(frame: &RawFrame) -> Result<QuantitySample> {
        let parsed = parse_quantity(&frame.text)?;
        Ok(QuantitySample {
            time: frame.timestamp(),
            raw_data: frame.text.clone(),
            parsed,
        })
    }

    fn take(queue: &SampleQueue<QuantitySample>) -> Option<QuantitySample> {
        queue.drain_latest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_sample_keeps_raw_line() {
        let frame = RawFrame::now("0125\r");
        let sample = Quantity::decode(&frame).unwrap();
        assert_eq!(sample.parsed, 12.5);
        assert_eq!(sample.raw_data, "0125\r");
        assert_eq!(sample.time, frame.timestamp());
    }

    #[test]
    fn test_composition_partial_frame_is_rejected() {
        let frame = RawFrame::now("F:04.12 S:08");
        assert!(Composition::decode(&frame).is_err());
    }

    #[test]
    fn test_drain_policies() {
        let frames = ["101", "102", "103"];
        let queue = SampleQueue::new();
        for f in frames {
            queue.push(Quantity::decode(&RawFrame::now(f)).unwrap());
        }
        let latest = Quantity::take(&queue).unwrap();
        assert_eq!(latest.parsed, 10.3);
        assert!(Quantity::take(&queue).is_none());
    }
}
