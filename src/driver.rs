//! Ingestion driver: drains the packet queue into a telemetry sink

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use crate::queue::PacketReceiver;
use crate::sink::TelemetrySink;
use crate::{IngestError, Result};

/// Drains the packet queue on a fixed poll cadence
///
/// The driver owns the consumer side of the queue and the sink. It never
/// waits for packets: each poll delivers whatever has been queued since the
/// previous one, in queue order.
pub struct Driver;

impl Driver {
    /// Deliver everything currently queued to `sink`, returning the count
    pub fn drain<S>(queue: &mut PacketReceiver, sink: &mut S) -> usize
    where
        S: TelemetrySink + ?Sized,
    {
        let mut delivered = 0;
        for packet in queue.drain() {
            sink.ingest(&packet);
            delivered += 1;
        }
        sink.end_batch(delivered);
        delivered
    }

    /// Spawn the driver task, polling every `poll`
    pub fn spawn<S>(queue: PacketReceiver, sink: S, poll: Duration) -> DriverHandle<S>
    where
        S: TelemetrySink + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::run(queue, sink, poll, cancel.clone()));
        DriverHandle { cancel: cancel.drop_guard(), task }
    }

    async fn run<S>(mut queue: PacketReceiver, mut sink: S, poll: Duration, cancel: CancellationToken) -> S
    where
        S: TelemetrySink + 'static,
    {
        info!(poll_ms = poll.as_millis() as u64, "Ingestion driver started");
        let mut interval = tokio::time::interval(poll);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut total = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Hand over whatever arrived before shutdown
                    total += Self::drain(&mut queue, &mut sink) as u64;
                    debug!("Ingestion driver cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let delivered = Self::drain(&mut queue, &mut sink);
                    total += delivered as u64;
                    if delivered > 0 {
                        trace!(delivered, "Ingested batch");
                    }
                    if queue.is_closed() {
                        info!("All producers stopped, ingestion driver finishing");
                        break;
                    }
                }
            }
        }

        info!(packets = total, "Ingestion driver stopped");
        sink
    }
}

/// Handle to a running ingestion driver. Dropping it cancels the task.
pub struct DriverHandle<S> {
    cancel: DropGuard,
    task: JoinHandle<S>,
}

impl<S> DriverHandle<S> {
    /// Whether the driver task has ended on its own
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the driver after a final drain and take back the sink
    pub async fn stop(self) -> Result<S> {
        let Self { cancel, task } = self;
        drop(cancel);
        task.await.map_err(|e| {
            warn!(error = %e, "Ingestion driver task failed");
            IngestError::task_failed("ingestion driver", e)
        })
    }
}
