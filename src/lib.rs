//! UDP telemetry ingestion with capture recording and replay.
//!
//! Paddock receives the datagrams a racing simulator publishes over UDP and
//! hands them, in arrival order, to a single consumer. Sessions can be
//! recorded to capture files and replayed later with the original timing,
//! under transport control (pause, speed, reset).
//!
//! # Architecture
//!
//! - **Packet queue**: an unbounded channel between one producer and the
//!   ingestion consumer ([`packet_queue`])
//! - **Producers**: the [`LiveReceiver`] (UDP socket) or a [`PlaybackHandle`]
//!   replaying a [`Capture`] through a [`PlaybackScheduler`]
//! - **Consumer**: the ingestion [`Driver`] draining the queue into a
//!   [`TelemetrySink`]
//!
//! [`IngestSession`] wires one producer and the driver together from an
//! [`IngestConfig`].
//!
//! ## Example (capture replay)
//!
//! ```rust,no_run
//! use paddock::{Paddock, RawPacket};
//!
//! #[tokio::main]
//! async fn main() -> paddock::Result<()> {
//!     let session = Paddock::replay("race.pkl", |packet: &RawPacket| {
//!         println!("{} byte packet", packet.len());
//!     })
//!     .await?;
//!
//!     if let Some(playback) = session.playback() {
//!         playback.speed_up();
//!     }
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     session.shutdown().await?;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Packet flow
pub mod capture;
pub mod config;
pub mod driver;
pub mod providers;
pub mod queue;
pub mod scheduler;
pub mod session;
pub mod sink;

// Core exports
pub use error::*;
pub use types::*;

pub use capture::{Capture, CaptureEnd, CaptureReader, CaptureSummary, CaptureWriter};
pub use config::{IngestConfig, PlaybackConfig, ReceiverConfig};
pub use driver::{Driver, DriverHandle};
pub use providers::{LiveReceiver, PlaybackHandle, ReceiverStats};
pub use queue::{PacketReceiver, PacketSender, packet_queue};
pub use scheduler::{PlaybackScheduler, TransportCommand};
pub use session::{IngestSession, Producer, ProducerReport};
pub use sink::TelemetrySink;

/// Shortcuts for the two common session shapes.
///
/// For anything beyond the defaults build an [`IngestConfig`] and call
/// [`IngestSession::start`].
pub struct Paddock;

impl Paddock {
    /// Listen for live telemetry on `127.0.0.1:20777`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Bind`] if the port is already in use.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use paddock::{Paddock, RawPacket};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> paddock::Result<()> {
    /// let session = Paddock::listen(|packet: &RawPacket| println!("{:?}", packet)).await?;
    /// # session.shutdown().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn listen<S: TelemetrySink + 'static>(sink: S) -> Result<IngestSession<S>> {
        IngestSession::start(&IngestConfig::default(), sink).await
    }

    /// Replay a capture file at 1x with default playback settings.
    ///
    /// A missing or unreadable file replays nothing; see
    /// [`Capture::load`] for how read failures are reported.
    pub async fn replay<S, P>(path: P, sink: S) -> Result<IngestSession<S>>
    where
        S: TelemetrySink + 'static,
        P: AsRef<std::path::Path>,
    {
        let config = IngestConfig { capture: Some(path.as_ref().to_path_buf()), ..Default::default() };
        IngestSession::start(&config, sink).await
    }
}
