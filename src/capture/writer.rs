//! Capture recorder
//!
//! Writes records in the format [`CaptureReader`](super::CaptureReader)
//! consumes: one pickle tuple `(timestamp, source, payload)` per datagram,
//! appended back to back.

use serde_pickle::{SerOptions, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::time::SystemTime;

use super::timestamp::format_timestamp;
use crate::{IngestError, Result};

/// Appends datagrams to a capture
pub struct CaptureWriter<W: Write> {
    out: W,
    records: usize,
}

impl CaptureWriter<BufWriter<File>> {
    /// Create (or truncate) a capture file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| IngestError::file_error(parent.to_path_buf(), e))?;
        }
        let file = File::create(path).map_err(|e| IngestError::file_error(path.to_path_buf(), e))?;
        Ok(Self::new(BufWriter::with_capacity(1 << 16, file)))
    }
}

impl<W: Write> CaptureWriter<W> {
    /// Write records into any byte sink
    pub fn new(out: W) -> Self {
        Self { out, records: 0 }
    }

    /// Record a datagram received at `at` from `source`
    pub fn append(&mut self, at: SystemTime, source: Option<SocketAddr>, payload: &[u8]) -> Result<()> {
        let source = source.map(|addr| addr.to_string()).unwrap_or_default();
        self.append_stamped(&format_timestamp(at), &source, payload)
    }

    /// Record a datagram with a caller-provided `HH:MM:SS:UUUUUU` stamp
    pub fn append_stamped(&mut self, timestamp: &str, source: &str, payload: &[u8]) -> Result<()> {
        let record = Value::Tuple(vec![
            Value::String(timestamp.to_owned()),
            Value::String(source.to_owned()),
            Value::Bytes(payload.to_vec()),
        ]);
        serde_pickle::value_to_writer(&mut self.out, &record, SerOptions::new())?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far
    pub fn records(&self) -> usize {
        self.records
    }

    /// Flush buffered records
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying sink
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
