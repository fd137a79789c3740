//! Ingest session: one producer plus the ingestion driver

use std::net::SocketAddr;
use tracing::info;

use crate::capture::Capture;
use crate::config::{IngestConfig, PlaybackConfig};
use crate::driver::{Driver, DriverHandle};
use crate::providers::{LiveReceiver, PlaybackHandle, ReceiverStats};
use crate::queue::{PacketSender, packet_queue};
use crate::scheduler::PlaybackScheduler;
use crate::sink::TelemetrySink;
use crate::types::PlaybackStatus;
use crate::Result;

/// The packet source feeding a session
pub enum Producer {
    /// UDP datagrams from the simulator
    Live(LiveReceiver),
    /// A capture replayed on a virtual clock
    Replay(PlaybackHandle),
}

/// What the producer reported when the session shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerReport {
    Live(ReceiverStats),
    Replay(PlaybackStatus),
}

/// A running ingestion pipeline.
///
/// Exactly one producer writes into the session's queue: the live receiver,
/// or capture playback when a capture is configured. The driver drains the
/// queue into the sink either way.
pub struct IngestSession<S> {
    producer: Producer,
    driver: DriverHandle<S>,
}

impl<S> IngestSession<S>
where
    S: TelemetrySink + 'static,
{
    /// Start the producer selected by `config` and the ingestion driver.
    ///
    /// An unreadable capture still starts a session; it just has nothing
    /// to replay.
    pub async fn start(config: &IngestConfig, sink: S) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = packet_queue();

        let producer = match &config.capture {
            Some(path) => {
                info!(path = %path.display(), "Starting replay session");
                Producer::Replay(spawn_playback(Capture::load(path), &config.playback, tx))
            }
            None => {
                info!(addr = %config.receiver.bind_addr(), "Starting live session");
                Producer::Live(LiveReceiver::bind(&config.receiver, tx).await?)
            }
        };

        let driver = Driver::spawn(rx, sink, config.poll_interval());
        Ok(Self { producer, driver })
    }

    /// Replay an already loaded capture, ignoring `config.capture`
    pub fn replay(capture: Capture, config: &IngestConfig, sink: S) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = packet_queue();
        let producer = Producer::Replay(spawn_playback(capture, &config.playback, tx));
        let driver = Driver::spawn(rx, sink, config.poll_interval());
        Ok(Self { producer, driver })
    }

    /// The producer feeding this session
    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    /// Transport controls, in replay mode
    pub fn playback(&self) -> Option<&PlaybackHandle> {
        match &self.producer {
            Producer::Replay(handle) => Some(handle),
            Producer::Live(_) => None,
        }
    }

    /// Bound socket address, in live mode
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.producer {
            Producer::Live(receiver) => Some(receiver.local_addr()),
            Producer::Replay(_) => None,
        }
    }

    /// Whether packets come from a capture rather than the network
    pub fn is_replay(&self) -> bool {
        matches!(self.producer, Producer::Replay(_))
    }

    /// Stop the producer, deliver what is still queued, and return the sink
    pub async fn shutdown(self) -> Result<(S, ProducerReport)> {
        let report = match self.producer {
            Producer::Live(receiver) => ProducerReport::Live(receiver.close().await),
            Producer::Replay(playback) => ProducerReport::Replay(playback.stop().await),
        };
        let sink = self.driver.stop().await?;
        info!(?report, "Ingest session shut down");
        Ok((sink, report))
    }
}

fn spawn_playback(capture: Capture, config: &PlaybackConfig, queue: PacketSender) -> PlaybackHandle {
    let scheduler = PlaybackScheduler::new(capture.shared_packets())
        .with_gap_skip(config.gap_skip_ms)
        .with_speed(config.initial_speed)
        .with_playing(!config.start_paused);
    PlaybackHandle::spawn(scheduler, queue, config.tick())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{packet_id, timed_packets};
    use crate::types::RawPacket;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    #[derive(Default)]
    struct Ids(Vec<u32>);

    impl TelemetrySink for Ids {
        fn ingest(&mut self, packet: &RawPacket) {
            self.0.push(packet_id(packet));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn replay_session_delivers_the_whole_capture() {
        let capture = Capture::from_packets(timed_packets(&[0, 100, 250, 4000]));
        let session = IngestSession::replay(capture, &IngestConfig::default(), Ids::default()).expect("start");
        assert!(session.is_replay());
        assert!(session.local_addr().is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let (sink, report) = session.shutdown().await.expect("shutdown");

        assert_eq!(sink.0, vec![0, 1, 2, 3]);
        match report {
            ProducerReport::Replay(status) => assert!(status.is_exhausted()),
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_paused_holds_packets_until_play() {
        let mut config = IngestConfig::default();
        config.playback.start_paused = true;
        let capture = Capture::from_packets(timed_packets(&[0, 10]));
        let session = IngestSession::replay(capture, &config, Ids::default()).expect("start");

        tokio::time::sleep(Duration::from_secs(1)).await;
        let playback = session.playback().expect("replay mode");
        assert_eq!(playback.status().state.index, 0);

        playback.play();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let (sink, _) = session.shutdown().await.expect("shutdown");
        assert_eq!(sink.0, vec![0, 1]);
    }

    #[tokio::test]
    async fn live_session_ingests_datagrams() {
        let mut config = IngestConfig::default();
        config.receiver.port = 0;
        config.poll_interval_ms = 5;
        let session = IngestSession::start(&config, Ids::default()).await.expect("start");
        let addr = session.local_addr().expect("live mode");
        assert!(session.playback().is_none());

        let sender = UdpSocket::bind("127.0.0.1:0").await.expect("sender socket");
        for i in 0u32..3 {
            sender.send_to(&i.to_le_bytes(), addr).await.expect("send");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let (sink, report) = session.shutdown().await.expect("shutdown");
        assert_eq!(sink.0, vec![0, 1, 2]);
        let ProducerReport::Live(stats) = report else {
            panic!("unexpected report {:?}", report);
        };
        assert_eq!(stats.datagrams, 3);
        assert_eq!(stats.bytes, 12);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_binding() {
        let mut config = IngestConfig::default();
        config.playback.initial_speed = 0;

        let err = IngestSession::start(&config, Ids::default()).await.err().expect("invalid config");
        assert!(matches!(err, crate::IngestError::Config { .. }));
    }
}
