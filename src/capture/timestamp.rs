//! Time-of-day stamps in the capture format.
//!
//! Records carry their arrival time as `HH:MM:SS:UUUUUU`: two-digit hours,
//! minutes and seconds plus six-digit microseconds, colon separated, fixed
//! width.

use std::time::{SystemTime, UNIX_EPOCH};

/// Minimum length of a well-formed stamp
pub const TIMESTAMP_LEN: usize = 15;

/// Milliseconds in one day
pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

const MICROS_PER_DAY: u64 = DAY_MS * 1000;

/// Parse a stamp into milliseconds since midnight.
///
/// Returns `None` for strings shorter than [`TIMESTAMP_LEN`], fields that are
/// not digits, or hours/minutes/seconds above 24/59/59. Microseconds are
/// truncated to whole milliseconds.
pub fn parse_timestamp(stamp: &str) -> Option<u64> {
    let bytes = stamp.as_bytes();
    if bytes.len() < TIMESTAMP_LEN {
        return None;
    }

    let hours = digits(&bytes[0..2])?;
    let minutes = digits(&bytes[3..5])?;
    let seconds = digits(&bytes[6..8])?;
    let micros = digits(&bytes[9..15])?;

    if hours > 24 || minutes > 59 || seconds > 59 {
        return None;
    }

    let total_micros = ((hours * 60 + minutes) * 60 + seconds) * 1_000_000 + micros;
    Some(total_micros / 1000)
}

fn digits(field: &[u8]) -> Option<u64> {
    field.iter().try_fold(0u64, |acc, &b| {
        b.is_ascii_digit().then(|| acc * 10 + u64::from(b - b'0'))
    })
}

/// Format microseconds since midnight as a stamp
pub fn format_time_of_day(micros: u64) -> String {
    let micros = micros % MICROS_PER_DAY;
    let total_seconds = micros / 1_000_000;
    format!(
        "{:02}:{:02}:{:02}:{:06}",
        total_seconds / 3600,
        total_seconds / 60 % 60,
        total_seconds % 60,
        micros % 1_000_000
    )
}

/// Stamp a wall-clock instant (UTC time of day)
pub fn format_timestamp(at: SystemTime) -> String {
    let micros = at.duration_since(UNIX_EPOCH).map(|d| d.as_micros()).unwrap_or_default();
    format_time_of_day((micros % u128::from(MICROS_PER_DAY)) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn parses_to_truncated_milliseconds() {
        // 3_723_000.5 ms, truncated
        assert_eq!(parse_timestamp("01:02:03:000500"), Some(3_723_000));
        assert_eq!(parse_timestamp("00:00:00:000000"), Some(0));
        assert_eq!(parse_timestamp("23:59:59:999999"), Some(DAY_MS - 1));
    }

    #[test]
    fn rejects_short_or_out_of_range_stamps() {
        assert_eq!(parse_timestamp("01:02:03:00050"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("01:99:03:000500"), None);
        assert_eq!(parse_timestamp("01:02:99:000500"), None);
        assert_eq!(parse_timestamp("25:00:00:000000"), None);
    }

    #[test]
    fn rejects_non_digit_fields() {
        assert_eq!(parse_timestamp("ab:02:03:000500"), None);
        assert_eq!(parse_timestamp("01:02:03:0005x0"), None);
    }

    #[test]
    fn hour_24_is_accepted() {
        assert_eq!(parse_timestamp("24:00:00:000000"), Some(DAY_MS));
    }

    #[test]
    fn formats_fixed_width() {
        assert_eq!(format_time_of_day(3_723_000_500), "01:02:03:000500");
        assert_eq!(format_time_of_day(0), "00:00:00:000000");
    }

    #[test]
    fn wall_clock_stamp_wraps_to_time_of_day() {
        // 2 days, 1 hour, 2 minutes, 3.25 seconds after the epoch
        let at = UNIX_EPOCH + Duration::from_micros(2 * MICROS_PER_DAY + 3_723_250_000);
        assert_eq!(format_timestamp(at), "01:02:03:250000");
    }

    proptest! {
        #[test]
        fn formatted_stamps_parse_back(micros in 0u64..MICROS_PER_DAY) {
            let stamp = format_time_of_day(micros);
            prop_assert_eq!(stamp.len(), TIMESTAMP_LEN);
            prop_assert_eq!(parse_timestamp(&stamp), Some(micros / 1000));
        }
    }
}
