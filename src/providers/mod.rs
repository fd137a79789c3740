//! Packet producers: the live UDP receiver and capture playback.
//!
//! Both feed a [`PacketSender`](crate::queue::PacketSender). Only one of them
//! runs against a given queue; [`IngestSession`](crate::IngestSession) picks
//! which at startup.

pub mod live;
pub mod replay;

pub use live::{LiveReceiver, ReceiverStats};
pub use replay::PlaybackHandle;
