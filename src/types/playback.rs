//! Playback state and status snapshots

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Slowest playback multiplier
pub const MIN_SPEED: u32 = 1;

/// Fastest playback multiplier
pub const MAX_SPEED: u32 = 100;

/// Clamp a requested playback multiplier into `[MIN_SPEED, MAX_SPEED]`
pub fn clamp_speed(speed: u32) -> u32 {
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

/// Mutable playback position of a loaded capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Position of the next undelivered packet
    pub index: usize,

    /// Scheduler's "now" on the capture timeline
    pub virtual_clock_ms: u64,

    /// Playback multiplier, always within `[MIN_SPEED, MAX_SPEED]`
    pub speed: u32,

    /// Whether ticks advance the virtual clock
    pub playing: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self { index: 0, virtual_clock_ms: 0, speed: MIN_SPEED, playing: true }
    }
}

/// Read-only snapshot published by the playback task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    /// Current playback position
    pub state: PlaybackState,

    /// Number of packets in the capture
    pub total: usize,
}

impl PlaybackStatus {
    /// Fraction of packets delivered, in `[0.0, 1.0]`
    pub fn progress(&self) -> f64 {
        if self.total == 0 { 1.0 } else { self.state.index as f64 / self.total as f64 }
    }

    /// Virtual clock as a duration
    pub fn position(&self) -> Duration {
        Duration::from_millis(self.state.virtual_clock_ms)
    }

    /// All packets delivered
    pub fn is_exhausted(&self) -> bool {
        self.state.index >= self.total
    }
}

// Renders like the transport readout: `m:ss.t [index/total] 2x playing`
impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = self.state.virtual_clock_ms;
        let tenths = clock % 1000 / 100;
        let seconds = clock / 1000;
        write!(
            f,
            "{}:{:02}.{} [{}/{}] {}x {}",
            seconds / 60,
            seconds % 60,
            tenths,
            self.state.index,
            self.total,
            self.state.speed,
            if self.state.playing { "playing" } else { "paused" }
        )
    }
}
