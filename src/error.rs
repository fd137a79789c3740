//! Error types for telemetry ingestion.
//!
//! Only start-up operations return errors: binding the receive socket, loading
//! configuration and creating a capture recording. Once packets are flowing the
//! ingestion path degrades locally (logs and keeps going) instead of surfacing
//! errors to the consumer.
//!
//! ## Error Categories
//!
//! - **Bind / Socket Errors**: the UDP endpoint could not be opened or queried
//! - **File Errors**: a capture or configuration file could not be read or written
//! - **Capture Format Errors**: a capture record could not be encoded
//! - **Config Errors**: configuration failed to parse or validate
//! - **Task Errors**: a background task panicked or was aborted
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use paddock::IngestError;
//!
//! let error = IngestError::socket_error("query local address", std::io::Error::other("gone"));
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations.
pub type Result<T, E = IngestError> = std::result::Result<T, E>;

/// Main error type for ingestion operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    #[error("Failed to bind UDP socket on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket operation failed: {context}")]
    Socket {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Capture format error: {details}")]
    CaptureFormat {
        details: String,
        #[source]
        source: Option<serde_pickle::Error>,
    },

    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Background task '{task}' failed")]
    Task {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl IngestError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Bind { .. } => true,
            IngestError::Socket { .. } => true,
            IngestError::File { .. } => false,
            IngestError::CaptureFormat { .. } => false,
            IngestError::Config { .. } => false,
            IngestError::Task { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            IngestError::Bind { .. } => vec![
                "Check that no other telemetry tool is bound to the port",
                "Verify the bind address exists on this machine",
                "Match the port configured in the game's UDP settings",
            ],
            IngestError::Socket { .. } => vec![
                "Retry the operation",
                "Check firewall rules for loopback UDP traffic",
            ],
            IngestError::File { .. } => vec![
                "Check file exists and is readable",
                "Check directory permissions for recordings",
                "Ensure sufficient disk space",
            ],
            IngestError::CaptureFormat { .. } => vec![
                "Verify the capture file was produced by a compatible recorder",
                "Record a fresh capture",
            ],
            IngestError::Config { .. } => vec![
                "Check configuration field names and value ranges",
                "Compare against the documented defaults",
            ],
            IngestError::Task { .. } => vec![
                "Inspect the log output for the panic message",
                "Restart the ingest session",
            ],
        }
    }

    /// Helper constructor for bind failures.
    pub fn bind_failed(addr: SocketAddr, source: std::io::Error) -> Self {
        IngestError::Bind { addr, source }
    }

    /// Helper constructor for socket errors.
    pub fn socket_error(context: impl Into<String>, source: std::io::Error) -> Self {
        IngestError::Socket { context: context.into(), source }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        IngestError::File { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        IngestError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_error_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        IngestError::Config { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for background task failures.
    pub fn task_failed(task: &'static str, source: tokio::task::JoinError) -> Self {
        IngestError::Task { task, source }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_pickle::Error> for IngestError {
    fn from(err: serde_pickle::Error) -> Self {
        IngestError::CaptureFormat { details: err.to_string(), source: Some(err) }
    }
}
