use chrono::{DateTime, SecondsFormat};

use crate::error::{Result, TransformError};

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Conversions for nanosecond-precision stream timestamps
pub struct TimeCodec;

impl TimeCodec {
    /// Parse a nanosecond timestamp string.
    ///
    /// Only plain ASCII digits are accepted: no sign, no whitespace.
    pub fn parse_nanos(nanos: &str) -> Result<u64> {
        let invalid = || TransformError::InvalidTimestamp {
            value: nanos.to_string(),
        };

        if nanos.is_empty() || !nanos.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        nanos.parse::<u64>().map_err(|_| invalid())
    }

    /// ISO-8601 UTC timestamp, truncated to millisecond precision
    pub fn to_millis_iso(nanos: &str) -> Result<String> {
        let millis = Self::parse_nanos(nanos)? / NANOS_PER_MILLI;

        // u64::MAX nanos is in the year 2554, well inside chrono's range
        let dt = i64::try_from(millis)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| TransformError::InvalidTimestamp {
                value: nanos.to_string(),
            })?;

        Ok(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Full-precision view, returned unchanged
    pub fn passthrough_nanos(nanos: &str) -> &str {
        nanos
    }
}
