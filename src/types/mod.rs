//! Core data types shared by producers, the queue and consumers.
//!
//! - [`RawPacket`] is one opaque datagram payload with a shared buffer
//! - [`TimedPacket`] places a payload on a capture's timeline
//! - [`PlaybackState`] and [`PlaybackStatus`] describe replay position

mod packet;
mod playback;

pub use packet::{RawPacket, TimedPacket};
pub use playback::{MAX_SPEED, MIN_SPEED, PlaybackState, PlaybackStatus, clamp_speed};
