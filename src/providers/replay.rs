//! Capture playback task
//!
//! [`PlaybackHandle::spawn`] moves a [`PlaybackScheduler`] onto its own task.
//! The task ticks the scheduler on a fixed period and applies transport
//! commands in between, so the virtual clock has exactly one owner. Every
//! change is published as a [`PlaybackStatus`] on a watch channel.

use futures::Stream;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::queue::PacketSender;
use crate::scheduler::{PlaybackScheduler, TransportCommand};
use crate::types::PlaybackStatus;

/// Control handle for a running playback task
pub struct PlaybackHandle {
    commands: mpsc::UnboundedSender<TransportCommand>,
    status: watch::Receiver<PlaybackStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<PlaybackStatus>>,
}

impl PlaybackHandle {
    /// Start replaying `scheduler` into `queue`, ticking every `tick`.
    ///
    /// The first tick happens one period after the call.
    pub fn spawn(scheduler: PlaybackScheduler, queue: PacketSender, tick: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(scheduler.status());
        let cancel = CancellationToken::new();

        info!(
            packets = scheduler.len(),
            tick_ms = tick.as_millis() as u64,
            speed = scheduler.state().speed,
            playing = scheduler.state().playing,
            "Starting capture playback"
        );

        let task = PlaybackTask { scheduler, queue, tick, commands: command_rx, status: status_tx, cancel: cancel.clone() };
        let task = tokio::spawn(task.run());

        Self { commands: command_tx, status: status_rx, cancel, task: Some(task) }
    }

    /// Rewind to the first packet
    pub fn reset(&self) {
        self.send(TransportCommand::Reset);
    }

    /// Pause if playing, resume if paused
    pub fn toggle_play(&self) {
        self.send(TransportCommand::TogglePlay);
    }

    /// Resume from the current clock
    pub fn play(&self) {
        self.send(TransportCommand::Play);
    }

    /// Freeze the clock; nothing is released until resumed
    pub fn pause(&self) {
        self.send(TransportCommand::Pause);
    }

    /// Double the speed, saturating at the maximum
    pub fn speed_up(&self) {
        self.send(TransportCommand::SpeedUp);
    }

    /// Halve the speed, saturating at the minimum
    pub fn slow_down(&self) {
        self.send(TransportCommand::SlowDown);
    }

    /// Queue a command for the playback task. Applied before the next tick.
    pub fn send(&self, command: TransportCommand) {
        if self.commands.send(command).is_err() {
            debug!(?command, "Playback task has stopped, command ignored");
        }
    }

    /// Latest published status
    pub fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    /// Stream of status snapshots, starting with the current one
    pub fn status_updates(&self) -> impl Stream<Item = PlaybackStatus> + 'static {
        WatchStream::new(self.status.clone())
    }

    /// Stop the task and return the final status
    pub async fn stop(mut self) -> PlaybackStatus {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => match task.await {
                Ok(status) => status,
                Err(e) => {
                    warn!(error = %e, "Playback task failed");
                    *self.status.borrow()
                }
            },
            None => *self.status.borrow(),
        }
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        debug!("Dropping playback handle");
        self.cancel.cancel();
    }
}

struct PlaybackTask {
    scheduler: PlaybackScheduler,
    queue: PacketSender,
    tick: Duration,
    commands: mpsc::UnboundedReceiver<TransportCommand>,
    status: watch::Sender<PlaybackStatus>,
    cancel: CancellationToken,
}

impl PlaybackTask {
    async fn run(mut self) -> PlaybackStatus {
        let mut interval = tokio::time::interval_at(Instant::now() + self.tick, self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut announced_end = false;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(command) = self.commands.recv() => {
                    self.scheduler.apply(command);
                    debug!(?command, status = %self.scheduler.status(), "Transport command applied");
                    if command == TransportCommand::Reset {
                        announced_end = false;
                    }
                }
                _ = interval.tick() => {
                    if self.queue.is_closed() {
                        debug!("Packet queue closed, stopping playback");
                        break;
                    }
                    let released = self.scheduler.tick(self.tick, &self.queue);
                    if released > 0 {
                        trace!(released, status = %self.scheduler.status(), "Playback tick");
                    }
                    if self.scheduler.is_exhausted() && !announced_end {
                        info!(packets = self.scheduler.len(), "Capture playback reached the end");
                        announced_end = true;
                    }
                }
            }
            self.publish();
        }

        let status = self.scheduler.status();
        info!(%status, "Capture playback stopped");
        status
    }

    fn publish(&self) {
        let next = self.scheduler.status();
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
