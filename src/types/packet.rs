//! Packet types that flow from producers to the consumer

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// One UDP datagram payload.
///
/// The bytes are opaque to this crate and shared behind an `Arc`, so a loaded
/// capture can be replayed any number of times without copying payloads.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RawPacket(Arc<[u8]>);

impl RawPacket {
    /// Create a packet from owned bytes
    pub fn new(data: Vec<u8>) -> Self {
        Self(data.into())
    }

    /// Borrow the payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for RawPacket {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for RawPacket {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RawPacket {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for RawPacket {
    fn from(data: &[u8]) -> Self {
        Self(data.into())
    }
}

// Payloads can be large; print the size instead of the bytes.
impl fmt::Debug for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPacket").field(&format_args!("{} bytes", self.0.len())).finish()
    }
}

/// A captured packet positioned on the capture's own timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedPacket {
    /// Milliseconds since the capture's first timestamp
    pub offset_ms: u64,

    /// Datagram payload
    pub payload: RawPacket,
}

impl TimedPacket {
    /// Create a new timed packet
    pub fn new(offset_ms: u64, payload: impl Into<RawPacket>) -> Self {
        Self { offset_ms, payload: payload.into() }
    }
}
