//! Sink trait for ingested telemetry

use crate::types::RawPacket;

/// Consumer of dequeued telemetry payloads
///
/// The ingestion driver hands every payload to [`ingest`](Self::ingest) in
/// queue order, then calls [`end_batch`](Self::end_batch) once per poll. The
/// sink runs on the driver task and should not block.
///
/// Any `FnMut(&RawPacket)` closure is a sink.
pub trait TelemetrySink: Send {
    /// Handle one payload
    fn ingest(&mut self, packet: &RawPacket);

    /// Called after each poll with the number of payloads it delivered
    fn end_batch(&mut self, _delivered: usize) {}
}

impl<F> TelemetrySink for F
where
    F: FnMut(&RawPacket) + Send,
{
    fn ingest(&mut self, packet: &RawPacket) {
        self(packet)
    }
}
