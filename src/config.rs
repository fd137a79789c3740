//! Ingestion configuration.
//!
//! Configuration is plain serde data, loadable from YAML. Every field has a
//! default, so an empty document is a valid configuration: live mode on
//! `127.0.0.1:20777`.
//!
//! ```rust
//! use paddock::IngestConfig;
//!
//! let config = IngestConfig::from_yaml_str("capture: race.pkl\nplayback:\n  initial_speed: 4\n")?;
//! assert!(config.is_replay());
//! assert_eq!(config.playback.initial_speed, 4);
//! assert_eq!(config.receiver.port, 20777);
//! # Ok::<(), paddock::IngestError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::DEFAULT_GAP_SKIP_MS;
use crate::types::{MAX_SPEED, MIN_SPEED};
use crate::{IngestError, Result};

/// Port the simulator's UDP telemetry is published on
pub const DEFAULT_TELEMETRY_PORT: u16 = 20777;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Capture file to replay; live mode when absent
    pub capture: Option<PathBuf>,

    /// Ingestion driver poll cadence
    pub poll_interval_ms: u64,

    /// Live receiver settings
    pub receiver: ReceiverConfig,

    /// Replay settings
    pub playback: PlaybackConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            capture: None,
            poll_interval_ms: 40,
            receiver: ReceiverConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

/// Live receiver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiverConfig {
    pub bind_address: IpAddr,
    pub port: u16,

    /// Upper bound on a single blocking receive
    pub receive_timeout_ms: u64,

    /// Largest datagram accepted; longer datagrams are truncated by the OS
    pub buffer_size: usize,

    /// Record every received datagram to this capture file
    pub record_to: Option<PathBuf>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_TELEMETRY_PORT,
            receive_timeout_ms: 3000,
            buffer_size: 2048,
            record_to: None,
        }
    }
}

impl ReceiverConfig {
    /// Socket address to bind
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

/// Replay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    /// Scheduler tick period
    pub tick_ms: u64,
    pub initial_speed: u32,

    /// Idle gaps longer than this are skipped
    pub gap_skip_ms: u64,
    pub start_paused: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { tick_ms: 50, initial_speed: MIN_SPEED, gap_skip_ms: DEFAULT_GAP_SKIP_MS, start_paused: false }
    }
}

impl PlaybackConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl IngestConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| {
            IngestError::config_error_with_source("failed to parse YAML configuration", Box::new(e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| IngestError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Render as YAML
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| {
            IngestError::config_error_with_source("failed to render configuration", Box::new(e))
        })
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(IngestError::config_error("poll_interval_ms must be positive"));
        }
        if self.receiver.receive_timeout_ms == 0 {
            return Err(IngestError::config_error("receiver.receive_timeout_ms must be positive"));
        }
        if self.receiver.buffer_size == 0 {
            return Err(IngestError::config_error("receiver.buffer_size must be positive"));
        }
        if self.playback.tick_ms == 0 {
            return Err(IngestError::config_error("playback.tick_ms must be positive"));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.playback.initial_speed) {
            return Err(IngestError::config_error(format!(
                "playback.initial_speed must be within {}..={}, got {}",
                MIN_SPEED, MAX_SPEED, self.playback.initial_speed
            )));
        }
        Ok(())
    }

    /// A capture is configured, so replay replaces the live receiver
    pub fn is_replay(&self) -> bool {
        self.capture.is_some()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
