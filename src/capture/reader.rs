//! Capture file reader for offline replay
//!
//! A capture is a back-to-back sequence of pickle records, each a tuple of
//! `(timestamp, source, payload)`. Only the timestamp and payload are used
//! here. Reading never fails: a missing file yields an empty capture and a
//! damaged file yields the records before the damage. How reading ended is
//! reported in [`CaptureSummary`].
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use paddock::capture::Capture;
//!
//! let capture = Capture::load("session.pkl");
//! println!("{} packets, {:?}", capture.len(), capture.summary().end);
//! ```

use serde_pickle::{DeOptions, Deserializer, ErrorCode, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::timestamp::{DAY_MS, parse_timestamp};
use crate::types::{RawPacket, TimedPacket};

/// How reading a capture ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEnd {
    /// The deserializer ran out of bytes.
    ///
    /// This covers both a clean end of file and a final record that was cut
    /// off mid-way; the pickle stream cannot tell them apart.
    EndOfStream,

    /// Bytes that do not decode as a record; everything before them is kept
    Corrupt { reason: String },

    /// The file could not be opened or read at all
    Unreadable { reason: String },
}

/// Bookkeeping from a capture load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Records decoded, including dropped ones
    pub records_read: usize,

    /// Records without a usable payload
    pub dropped: usize,

    /// Why reading stopped
    pub end: CaptureEnd,
}

/// An immutable, loaded capture
#[derive(Debug, Clone)]
pub struct Capture {
    packets: Arc<[TimedPacket]>,
    summary: CaptureSummary,
}

impl Capture {
    /// Load a capture file. Never fails; see [`CaptureSummary::end`].
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => {
                let capture = CaptureReader::new(BufReader::new(file)).read_all();
                info!(
                    path = %path.display(),
                    packets = capture.len(),
                    dropped = capture.summary.dropped,
                    "Loaded capture"
                );
                capture
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Capture unreadable, nothing to play");
                Self::empty(CaptureEnd::Unreadable { reason: e.to_string() })
            }
        }
    }

    /// Read a capture from any byte source
    pub fn from_reader<R: Read>(reader: R) -> Self {
        CaptureReader::new(reader).read_all()
    }

    /// Build a capture from packets already on a timeline
    pub fn from_packets(packets: Vec<TimedPacket>) -> Self {
        let records_read = packets.len();
        Self {
            packets: packets.into(),
            summary: CaptureSummary { records_read, dropped: 0, end: CaptureEnd::EndOfStream },
        }
    }

    fn empty(end: CaptureEnd) -> Self {
        Self {
            packets: Arc::from(Vec::new()),
            summary: CaptureSummary { records_read: 0, dropped: 0, end },
        }
    }

    /// Packets in capture order
    pub fn packets(&self) -> &[TimedPacket] {
        &self.packets
    }

    /// Shared handle to the packet list
    pub fn shared_packets(&self) -> Arc<[TimedPacket]> {
        Arc::clone(&self.packets)
    }

    /// Load bookkeeping
    pub fn summary(&self) -> &CaptureSummary {
        &self.summary
    }

    /// Number of packets
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether there is nothing to play
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Offset of the last packet
    pub fn duration_ms(&self) -> u64 {
        self.packets.last().map(|p| p.offset_ms).unwrap_or(0)
    }
}

/// Sequential, forward-only reader over pickle records
pub struct CaptureReader<R: Read> {
    de: Deserializer<R>,
    zero_ms: Option<u64>,
    records_read: usize,
    dropped: usize,
}

impl<R: Read> CaptureReader<R> {
    /// Wrap a byte source
    pub fn new(reader: R) -> Self {
        Self {
            de: Deserializer::new(reader, DeOptions::new()),
            zero_ms: None,
            records_read: 0,
            dropped: 0,
        }
    }

    /// Read the next usable packet.
    ///
    /// `Err` carries the reason reading stopped; the reader must not be used
    /// afterwards.
    pub fn next_packet(&mut self) -> Result<TimedPacket, CaptureEnd> {
        loop {
            let value = self.de.deserialize_value().map_err(classify_end)?;
            self.records_read += 1;

            match self.extract(value) {
                Some(packet) => return Ok(packet),
                None => {
                    self.dropped += 1;
                    trace!("Dropping capture record {} without payload", self.records_read);
                }
            }
        }
    }

    /// Read until the stream stops, keeping every packet before the stop
    pub fn read_all(mut self) -> Capture {
        let mut packets = Vec::new();
        let end = loop {
            match self.next_packet() {
                Ok(packet) => packets.push(packet),
                Err(end) => break end,
            }
        };

        match &end {
            CaptureEnd::Corrupt { reason } => warn!(
                records = self.records_read,
                reason = %reason,
                "Capture truncated at undecodable data"
            ),
            _ => debug!(records = self.records_read, "Capture stream ended"),
        }

        Capture {
            packets: packets.into(),
            summary: CaptureSummary { records_read: self.records_read, dropped: self.dropped, end },
        }
    }

    fn extract(&mut self, value: Value) -> Option<TimedPacket> {
        let mut fields = match value {
            Value::Tuple(fields) | Value::List(fields) => fields,
            _ => return None,
        };

        // The zero point is taken from the first parsable stamp even when that
        // record turns out to have no payload.
        let offset_ms = match fields.first() {
            Some(Value::String(stamp)) => match parse_timestamp(stamp) {
                Some(ms) => self.offset_from_zero(ms),
                None => 0,
            },
            _ => 0,
        };

        match fields.get_mut(2) {
            Some(Value::Bytes(payload)) => {
                Some(TimedPacket::new(offset_ms, RawPacket::new(std::mem::take(payload))))
            }
            _ => None,
        }
    }

    fn offset_from_zero(&mut self, ms: u64) -> u64 {
        let zero = *self.zero_ms.get_or_insert(ms);
        if ms >= zero {
            ms - zero
        } else {
            // Stamps are times of day; an earlier stamp means midnight passed.
            ms + DAY_MS - zero
        }
    }
}

fn classify_end(err: serde_pickle::Error) -> CaptureEnd {
    match err {
        serde_pickle::Error::Eval(ErrorCode::EOFWhileParsing, _)
        | serde_pickle::Error::Syntax(ErrorCode::EOFWhileParsing) => CaptureEnd::EndOfStream,
        serde_pickle::Error::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            CaptureEnd::EndOfStream
        }
        other => CaptureEnd::Corrupt { reason: other.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{capture_at, capture_bytes, packet_id, stamp};
    use serde_pickle::SerOptions;

    fn offsets(capture: &Capture) -> Vec<u64> {
        capture.packets().iter().map(|p| p.offset_ms).collect()
    }

    fn pickle(value: &Value) -> Vec<u8> {
        serde_pickle::value_to_vec(value, SerOptions::new()).expect("pickle value")
    }

    #[test]
    fn first_record_defines_zero_point() {
        let capture = Capture::from_reader(capture_at(&[10_000, 10_500, 14_000]).as_slice());

        assert_eq!(offsets(&capture), vec![0, 500, 4000]);
        assert_eq!(capture.duration_ms(), 4000);
        assert_eq!(capture.summary().records_read, 3);
        assert_eq!(capture.summary().end, CaptureEnd::EndOfStream);
    }

    #[test]
    fn capture_order_is_kept_without_sorting() {
        let capture = Capture::from_reader(capture_at(&[5_000, 7_000, 6_000]).as_slice());

        let ids: Vec<u32> = capture.packets().iter().map(|p| packet_id(&p.payload)).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(offsets(&capture), vec![0, 2000, 1000]);
    }

    #[test]
    fn rejected_stamps_become_offset_zero() {
        let bytes = capture_bytes([
            (stamp(20_000).as_str(), &b"a"[..]),
            ("01:99:03:000500", &b"b"[..]),
            ("short", &b"c"[..]),
            (stamp(21_000).as_str(), &b"d"[..]),
        ]);
        let capture = Capture::from_reader(bytes.as_slice());

        assert_eq!(offsets(&capture), vec![0, 0, 0, 1000]);
    }

    #[test]
    fn rejected_first_stamp_does_not_set_zero_point() {
        let bytes = capture_bytes([
            ("garbage-stamp!!", &b"a"[..]),
            (stamp(30_000).as_str(), &b"b"[..]),
            (stamp(30_250).as_str(), &b"c"[..]),
        ]);
        let capture = Capture::from_reader(bytes.as_slice());

        assert_eq!(offsets(&capture), vec![0, 0, 250]);
    }

    #[test]
    fn records_without_bytes_payload_are_dropped() {
        let mut bytes = capture_at(&[1_000]);
        bytes.extend(pickle(&Value::Tuple(vec![
            Value::String(stamp(1_100)),
            Value::String(String::new()),
            Value::String("not bytes".into()),
        ])));
        bytes.extend(pickle(&Value::I64(7)));
        bytes.extend(pickle(&Value::List(vec![
            Value::String(stamp(1_200)),
            Value::None,
            Value::Bytes(vec![0xAA]),
        ])));
        let capture = Capture::from_reader(bytes.as_slice());

        assert_eq!(capture.len(), 2);
        assert_eq!(offsets(&capture), vec![0, 200]);
        assert_eq!(capture.summary().records_read, 4);
        assert_eq!(capture.summary().dropped, 2);
    }

    #[test]
    fn corrupt_trailing_bytes_keep_valid_prefix() {
        let mut bytes = capture_at(&[1_000, 1_020, 1_040]);
        bytes.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x13, 0x37]);
        let capture = Capture::from_reader(bytes.as_slice());

        assert_eq!(offsets(&capture), vec![0, 20, 40]);
        assert!(matches!(capture.summary().end, CaptureEnd::Corrupt { .. }));
    }

    #[test]
    fn record_cut_off_mid_way_reads_as_end_of_stream() {
        let mut bytes = capture_at(&[1_000, 1_020]);
        let last_record = capture_at(&[1_040]);
        bytes.extend_from_slice(&last_record[..last_record.len() / 2]);
        let capture = Capture::from_reader(bytes.as_slice());

        assert_eq!(capture.len(), 2);
        assert_eq!(capture.summary().end, CaptureEnd::EndOfStream);
    }

    #[test]
    fn corrupt_from_first_record_is_empty() {
        let capture = Capture::from_reader(&[0xFFu8, 0x01, 0x02][..]);

        assert!(capture.is_empty());
        assert!(matches!(capture.summary().end, CaptureEnd::Corrupt { .. }));
    }

    #[test]
    fn missing_file_is_empty_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let capture = Capture::load(dir.path().join("does-not-exist.pkl"));

        assert!(capture.is_empty());
        assert!(matches!(capture.summary().end, CaptureEnd::Unreadable { .. }));
    }

    #[test]
    fn session_across_midnight_keeps_offsets_increasing() {
        let bytes = capture_bytes([
            ("23:59:59:500000", &b"a"[..]),
            ("00:00:00:250000", &b"b"[..]),
        ]);
        let capture = Capture::from_reader(bytes.as_slice());

        assert_eq!(offsets(&capture), vec![0, 750]);
    }

    #[test]
    fn next_packet_streams_records() {
        let bytes = capture_at(&[2_000, 2_016]);
        let mut reader = CaptureReader::new(bytes.as_slice());

        assert_eq!(reader.next_packet().map(|p| p.offset_ms), Ok(0));
        assert_eq!(reader.next_packet().map(|p| p.offset_ms), Ok(16));
        assert_eq!(reader.next_packet().map(|p| p.offset_ms), Err(CaptureEnd::EndOfStream));
    }
}
