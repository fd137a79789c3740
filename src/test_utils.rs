//! Test utilities for building capture fixtures
//!
//! Fixtures are generated in memory rather than checked in, so tests and
//! benches always agree with the current capture format.

#![cfg(any(test, feature = "benchmark"))]

use crate::capture::{CaptureWriter, format_time_of_day};
use crate::types::TimedPacket;

/// Stamp for a time of day given in milliseconds
pub fn stamp(ms: u64) -> String {
    format_time_of_day(ms * 1000)
}

/// Encode `(stamp, payload)` records as capture bytes
pub fn capture_bytes<'a, I>(records: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut writer = CaptureWriter::new(Vec::new());
    for (timestamp, payload) in records {
        writer.append_stamped(timestamp, "127.0.0.1:20777", payload).expect("in-memory write");
    }
    writer.finish().expect("in-memory flush")
}

/// Encode a capture whose packets arrive at the given times of day (ms).
///
/// Packet `i` carries the little-endian bytes of `i as u32`.
pub fn capture_at(times_ms: &[u64]) -> Vec<u8> {
    let stamps: Vec<String> = times_ms.iter().map(|&ms| stamp(ms)).collect();
    let payloads: Vec<[u8; 4]> = (0..times_ms.len() as u32).map(u32::to_le_bytes).collect();
    capture_bytes(stamps.iter().map(String::as_str).zip(payloads.iter().map(|p| &p[..])))
}

/// Timed packets at the given offsets, payload `i` = `i as u32` little-endian
pub fn timed_packets(offsets_ms: &[u64]) -> Vec<TimedPacket> {
    offsets_ms
        .iter()
        .enumerate()
        .map(|(i, &offset)| TimedPacket::new(offset, (i as u32).to_le_bytes().to_vec()))
        .collect()
}

/// Decode a payload produced by [`timed_packets`] or [`capture_at`]
pub fn packet_id(payload: &[u8]) -> u32 {
    let mut id = [0u8; 4];
    id.copy_from_slice(&payload[..4]);
    u32::from_le_bytes(id)
}
