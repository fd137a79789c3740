//! Live UDP telemetry receiver

use std::io::Write;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::capture::CaptureWriter;
use crate::config::ReceiverConfig;
use crate::queue::PacketSender;
use crate::{IngestError, Result};

/// Counters accumulated by the receive task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams enqueued
    pub datagrams: u64,
    /// Payload bytes enqueued
    pub bytes: u64,
    /// Receive windows that elapsed without a datagram
    pub timeouts: u64,
    /// Socket errors
    pub errors: u64,
}

/// Receives datagrams on a UDP socket and enqueues each payload verbatim.
///
/// One background task owns the socket. It runs until [`close`](Self::close)
/// is called or the receiver is dropped; socket errors and timeouts are
/// logged and never end it.
pub struct LiveReceiver {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<ReceiverStats>>,
}

impl LiveReceiver {
    /// Bind the configured address and start receiving.
    ///
    /// When `record_to` is set every datagram is also appended to that
    /// capture file.
    pub async fn bind(config: &ReceiverConfig, queue: PacketSender) -> Result<Self> {
        let socket = bind_socket(config).await?;
        match &config.record_to {
            Some(path) => {
                let recorder = CaptureWriter::create(path)?;
                info!(path = %path.display(), "Recording live datagrams");
                Self::start(socket, config, queue, Some(recorder))
            }
            None => Self::start::<std::io::Sink>(socket, config, queue, None),
        }
    }

    /// Bind and record every datagram into `recorder`, ignoring `record_to`
    pub async fn bind_with_recorder<W>(
        config: &ReceiverConfig,
        queue: PacketSender,
        recorder: CaptureWriter<W>,
    ) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let socket = bind_socket(config).await?;
        Self::start(socket, config, queue, Some(recorder))
    }

    fn start<W>(
        socket: UdpSocket,
        config: &ReceiverConfig,
        queue: PacketSender,
        recorder: Option<CaptureWriter<W>>,
    ) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let local_addr =
            socket.local_addr().map_err(|e| IngestError::socket_error("query bound address", e))?;
        let cancel = CancellationToken::new();

        let receive = ReceiveLoop {
            socket,
            queue,
            recorder,
            buffer_size: config.buffer_size,
            receive_timeout: config.receive_timeout(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(receive.run());

        info!(%local_addr, timeout_ms = config.receive_timeout_ms, "Live receiver listening");
        Ok(Self { local_addr, cancel, task: Some(task) })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the receive task and wait for it to finish.
    ///
    /// Packets already enqueued stay in the queue.
    pub async fn close(mut self) -> ReceiverStats {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return ReceiverStats::default();
        };
        match task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Live receiver task failed");
                ReceiverStats::default()
            }
        }
    }
}

impl Drop for LiveReceiver {
    fn drop(&mut self) {
        debug!(local_addr = %self.local_addr, "Dropping live receiver");
        self.cancel.cancel();
    }
}

async fn bind_socket(config: &ReceiverConfig) -> Result<UdpSocket> {
    let addr = config.bind_addr();
    UdpSocket::bind(addr).await.map_err(|e| IngestError::bind_failed(addr, e))
}

struct ReceiveLoop<W: Write> {
    socket: UdpSocket,
    queue: PacketSender,
    recorder: Option<CaptureWriter<W>>,
    buffer_size: usize,
    receive_timeout: Duration,
    cancel: CancellationToken,
}

impl<W: Write> ReceiveLoop<W> {
    async fn run(mut self) -> ReceiverStats {
        let mut stats = ReceiverStats::default();
        let mut buf = vec![0u8; self.buffer_size];
        let mut consecutive_errors = 0u32;

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = tokio::time::timeout(self.receive_timeout, self.socket.recv_from(&mut buf)) => result,
            };

            match received {
                Ok(Ok((len, source))) => {
                    consecutive_errors = 0;
                    stats.datagrams += 1;
                    stats.bytes += len as u64;

                    let payload = &buf[..len];
                    trace!(len, %source, "Datagram received");
                    self.record(source, payload);
                    self.queue.enqueue(payload);
                }
                Err(_) => {
                    stats.timeouts += 1;
                    trace!("No datagram within {:?}", self.receive_timeout);
                }
                Ok(Err(e)) => {
                    stats.errors += 1;
                    consecutive_errors += 1;
                    if consecutive_errors == 1 {
                        warn!(error = %e, "UDP receive failed");
                    } else {
                        debug!(error = %e, consecutive_errors, "UDP receive still failing");
                    }

                    // 100ms, 200ms, ... capped at 1.6s
                    let backoff = Duration::from_millis(50 * (1 << consecutive_errors.min(5)));
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        if let Some(recorder) = self.recorder.take() {
            let records = recorder.records();
            match recorder.finish() {
                Ok(_) => info!(records, "Capture recording closed"),
                Err(e) => warn!(error = %e, "Failed to flush capture recording"),
            }
        }

        info!(
            datagrams = stats.datagrams,
            bytes = stats.bytes,
            errors = stats.errors,
            "Live receiver stopped"
        );
        stats
    }

    /// Append a datagram to the capture, if recording.
    ///
    /// The write is synchronous on the receive task. The recorder is
    /// buffered, so only the occasional flush reaches the file.
    fn record(&mut self, source: SocketAddr, payload: &[u8]) {
        let failed = match self.recorder.as_mut() {
            Some(recorder) => recorder.append(SystemTime::now(), Some(source), payload).err(),
            None => None,
        };
        if let Some(e) = failed {
            warn!(error = %e, "Capture recording failed, recording disabled");
            self.recorder = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Capture;
    use crate::queue::packet_queue;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Instant;

    fn ephemeral(timeout_ms: u64) -> ReceiverConfig {
        ReceiverConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            receive_timeout_ms: timeout_ms,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn datagrams_are_enqueued_in_arrival_order() {
        let _ = tracing_subscriber::fmt::try_init();
        let (tx, mut rx) = packet_queue();
        let receiver = LiveReceiver::bind(&ephemeral(100), tx).await.expect("bind");

        let sender = UdpSocket::bind("127.0.0.1:0").await.expect("sender socket");
        for i in 0u8..5 {
            sender.send_to(&[i, i, i], receiver.local_addr()).await.expect("send");
        }

        for i in 0u8..5 {
            let packet = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("datagram within 2s")
                .expect("queue open");
            assert_eq!(packet.as_bytes(), &[i, i, i]);
        }

        let stats = receiver.close().await;
        assert_eq!(stats.datagrams, 5);
        assert_eq!(stats.bytes, 15);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn close_does_not_wait_for_the_receive_timeout() {
        let (tx, rx) = packet_queue();
        let receiver = LiveReceiver::bind(&ephemeral(3000), tx).await.expect("bind");

        let started = Instant::now();
        let stats = receiver.close().await;

        assert!(started.elapsed() < Duration::from_secs(1), "close took {:?}", started.elapsed());
        assert_eq!(stats, ReceiverStats::default());
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn empty_windows_count_as_timeouts() {
        let (tx, _rx) = packet_queue();
        let receiver = LiveReceiver::bind(&ephemeral(20), tx).await.expect("bind");

        tokio::time::sleep(Duration::from_millis(150)).await;
        let stats = receiver.close().await;

        assert!(stats.timeouts >= 2, "timeouts: {}", stats.timeouts);
        assert_eq!(stats.datagrams, 0);
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").expect("occupy port");
        let config = ReceiverConfig { port: taken.local_addr().expect("addr").port(), ..ephemeral(100) };
        let (tx, _rx) = packet_queue();

        let err = LiveReceiver::bind(&config, tx).await.err().expect("port already bound");
        assert!(matches!(err, IngestError::Bind { .. }));
    }

    #[tokio::test]
    async fn recorded_datagrams_load_back_as_a_capture() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("captures").join("live.pkl");
        let config = ReceiverConfig { record_to: Some(path.clone()), ..ephemeral(100) };
        let (tx, mut rx) = packet_queue();
        let receiver = LiveReceiver::bind(&config, tx).await.expect("bind");

        let sender = UdpSocket::bind("127.0.0.1:0").await.expect("sender socket");
        for payload in [&b"lap"[..], b"sector", b"split"] {
            sender.send_to(payload, receiver.local_addr()).await.expect("send");
        }
        for _ in 0..3 {
            tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.expect("datagram").expect("open");
        }
        receiver.close().await;

        let capture = Capture::load(&path);
        let payloads: Vec<&[u8]> = capture.packets().iter().map(|p| p.payload.as_bytes()).collect();
        assert_eq!(payloads, vec![&b"lap"[..], b"sector", b"split"]);
        assert_eq!(capture.summary().records_read, 3);
        assert_eq!(capture.packets()[0].offset_ms, 0);
    }
}
