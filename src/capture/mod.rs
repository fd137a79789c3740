//! Capture files: recorded datagrams with arrival stamps.
//!
//! [`Capture`] loads a file into an immutable, offset-annotated packet list for
//! the playback scheduler. [`CaptureWriter`] produces such files from live
//! traffic.

mod reader;
mod timestamp;
mod writer;

pub use reader::{Capture, CaptureEnd, CaptureReader, CaptureSummary};
pub use timestamp::{DAY_MS, TIMESTAMP_LEN, format_time_of_day, format_timestamp, parse_timestamp};
pub use writer::CaptureWriter;
