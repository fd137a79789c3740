//! Virtual-clock playback scheduler.
//!
//! The scheduler replays a loaded capture into the packet queue. Each tick
//! advances a virtual clock by `period * speed` and releases every packet whose
//! offset is strictly behind the clock. Recorded idle periods longer than the
//! gap-skip threshold are jumped over instead of waited out.
//!
//! The scheduler is plain single-owner state with no interior locking. The
//! playback task in [`providers::replay`](crate::providers::replay) owns it
//! and applies transport commands between ticks.
//!
//! ```rust
//! use paddock::{PlaybackScheduler, TimedPacket, packet_queue};
//! use std::time::Duration;
//!
//! let (tx, mut rx) = packet_queue();
//! let mut scheduler = PlaybackScheduler::new(vec![
//!     TimedPacket::new(0, vec![1]),
//!     TimedPacket::new(30, vec![2]),
//! ]);
//!
//! assert_eq!(scheduler.tick(Duration::from_millis(50), &tx), 2);
//! assert_eq!(rx.drain().count(), 2);
//! assert!(scheduler.is_exhausted());
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::queue::PacketSender;
use crate::types::{MAX_SPEED, MIN_SPEED, PlaybackState, PlaybackStatus, TimedPacket, clamp_speed};

/// Default idle gap after which the clock jumps to the next packet
pub const DEFAULT_GAP_SKIP_MS: u64 = 3000;

/// Transport controls accepted by the playback task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    /// Rewind to the first packet
    Reset,
    /// Flip between playing and paused
    TogglePlay,
    /// Resume playback
    Play,
    /// Pause playback
    Pause,
    /// Double the playback speed
    SpeedUp,
    /// Halve the playback speed
    SlowDown,
}

/// Replays timed packets against a virtual clock
#[derive(Debug, Clone)]
pub struct PlaybackScheduler {
    packets: Arc<[TimedPacket]>,
    state: PlaybackState,
    gap_skip_ms: u64,
}

impl PlaybackScheduler {
    /// Create a scheduler positioned at the start, playing at 1x
    pub fn new(packets: impl Into<Arc<[TimedPacket]>>) -> Self {
        Self {
            packets: packets.into(),
            state: PlaybackState::default(),
            gap_skip_ms: DEFAULT_GAP_SKIP_MS,
        }
    }

    /// Override the gap-skip threshold
    pub fn with_gap_skip(mut self, gap_skip_ms: u64) -> Self {
        self.gap_skip_ms = gap_skip_ms;
        self
    }

    /// Start at a given speed (clamped)
    pub fn with_speed(mut self, speed: u32) -> Self {
        self.state.speed = clamp_speed(speed);
        self
    }

    /// Start paused or playing
    pub fn with_playing(mut self, playing: bool) -> Self {
        self.state.playing = playing;
        self
    }

    /// Advance by one tick of `period` and release due packets.
    ///
    /// Returns the number of packets enqueued. Paused or exhausted schedulers
    /// do nothing.
    pub fn tick(&mut self, period: Duration, queue: &PacketSender) -> usize {
        if !self.state.playing || self.is_exhausted() {
            return 0;
        }

        let step = (period.as_millis() as u64).saturating_mul(u64::from(self.state.speed));
        self.state.virtual_clock_ms = self.state.virtual_clock_ms.saturating_add(step);
        self.release(queue)
    }

    fn release(&mut self, queue: &PacketSender) -> usize {
        let mut released = 0;

        while let Some(next) = self.packets.get(self.state.index) {
            if next.offset_ms < self.state.virtual_clock_ms {
                queue.enqueue(next.payload.clone());
                self.state.index += 1;
                released += 1;
            } else if next.offset_ms > self.state.virtual_clock_ms.saturating_add(self.gap_skip_ms) {
                // The jumped-to packet is due on the following tick.
                debug!(
                    from_ms = self.state.virtual_clock_ms,
                    to_ms = next.offset_ms,
                    "Skipping idle gap in capture"
                );
                self.state.virtual_clock_ms = next.offset_ms;
            } else {
                break;
            }
        }

        if released > 0 {
            trace!(released, index = self.state.index, clock_ms = self.state.virtual_clock_ms, "Released packets");
        }
        released
    }

    /// Apply a transport control
    pub fn apply(&mut self, command: TransportCommand) {
        match command {
            TransportCommand::Reset => self.reset(),
            TransportCommand::TogglePlay => self.toggle_play(),
            TransportCommand::Play => self.play(),
            TransportCommand::Pause => self.pause(),
            TransportCommand::SpeedUp => self.speed_up(),
            TransportCommand::SlowDown => self.slow_down(),
        }
    }

    /// Rewind to the first packet
    pub fn reset(&mut self) {
        self.state.index = 0;
        self.state.virtual_clock_ms = 0;
    }

    /// Resume playback
    pub fn play(&mut self) {
        self.state.playing = true;
    }

    /// Pause playback
    pub fn pause(&mut self) {
        self.state.playing = false;
    }

    /// Flip between playing and paused
    pub fn toggle_play(&mut self) {
        self.state.playing = !self.state.playing;
    }

    /// Double the speed, saturating at [`MAX_SPEED`]
    pub fn speed_up(&mut self) {
        self.state.speed = self.state.speed.saturating_mul(2).min(MAX_SPEED);
    }

    /// Halve the speed, saturating at [`MIN_SPEED`]
    pub fn slow_down(&mut self) {
        self.state.speed = (self.state.speed / 2).max(MIN_SPEED);
    }

    /// Current position
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Snapshot for observers
    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus { state: self.state, total: self.packets.len() }
    }

    /// Every packet has been released
    pub fn is_exhausted(&self) -> bool {
        self.state.index >= self.packets.len()
    }

    /// Number of packets in the capture
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether the capture has no packets
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
