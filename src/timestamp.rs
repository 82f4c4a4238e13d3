//! Timestamp conversions shared by the read and write paths
//!
//! Every timestamp crossing the connector boundary is an epoch-nanosecond
//! `i64`. The host engine hands us millisecond precision plus picoseconds of
//! the millisecond, while the store renders query results as RFC 3339 strings.

use crate::{Error, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const PICOS_PER_NANO: u32 = 1_000;
pub const PICOS_PER_MILLI: u32 = 1_000_000_000;

/// High-precision timestamp with time zone, always expressed in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimestampTz {
    /// Milliseconds since the Unix epoch
    pub epoch_millis: i64,
    /// Picoseconds within the millisecond, in `[0, 1_000_000_000)`
    pub picos_of_milli: u32,
}

impl TimestampTz {
    pub fn new(epoch_millis: i64, picos_of_milli: u32) -> Result<Self> {
        if picos_of_milli >= PICOS_PER_MILLI {
            return Err(Error::InvalidArgument(format!(
                "picos_of_milli must be below {}, got {}",
                PICOS_PER_MILLI, picos_of_milli
            )));
        }
        Ok(Self {
            epoch_millis,
            picos_of_milli,
        })
    }

    pub fn from_epoch_nanos(nanos: i64) -> Self {
        Self {
            epoch_millis: nanos.div_euclid(NANOS_PER_MILLI),
            picos_of_milli: (nanos.rem_euclid(NANOS_PER_MILLI) as u32) * PICOS_PER_NANO,
        }
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let nanos_of_second = dt.timestamp_subsec_nanos();
        Self {
            epoch_millis: dt.timestamp() * 1_000 + i64::from(nanos_of_second / 1_000_000),
            picos_of_milli: (nanos_of_second % 1_000_000) * PICOS_PER_NANO,
        }
    }

    /// Epoch nanoseconds, rounding picoseconds half-up to the nearest nanosecond.
    ///
    /// Fails for instants outside the `i64` nanosecond range (before 1677 or
    /// after 2262).
    pub fn try_to_epoch_nanos(&self) -> Result<i64> {
        let nanos_of_milli = i64::from((self.picos_of_milli + PICOS_PER_NANO / 2) / PICOS_PER_NANO);
        self.epoch_millis
            .checked_mul(NANOS_PER_MILLI)
            .and_then(|nanos| nanos.checked_add(nanos_of_milli))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "timestamp {}ms (+{}ps) is outside the nanosecond range",
                    self.epoch_millis, self.picos_of_milli
                ))
            })
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.epoch_millis).map(|dt| {
            dt + chrono::Duration::nanoseconds(i64::from(self.picos_of_milli / PICOS_PER_NANO))
        })
    }
}

/// Parse a timestamp as rendered by the store in a query result.
///
/// Accepts RFC 3339 strings, optionally followed by a bracketed zone id
/// (`2024-01-01T00:00:00Z[UTC]`), and bare integers holding epoch nanoseconds.
pub fn parse_iso8601(raw: &str) -> Result<TimestampTz> {
    let trimmed = raw.trim();
    if let Ok(nanos) = trimmed.parse::<i64>() {
        return Ok(TimestampTz::from_epoch_nanos(nanos));
    }

    let without_zone_id = match trimmed.find('[') {
        Some(idx) if trimmed.ends_with(']') => &trimmed[..idx],
        _ => trimmed,
    };

    let parsed = DateTime::parse_from_rfc3339(without_zone_id).map_err(|e| {
        Error::InvalidArgument(format!("invalid timestamp '{}': {}", raw, e))
    })?;
    Ok(TimestampTz::from_datetime(parsed.with_timezone(&Utc)))
}

/// Current wall-clock time in epoch nanoseconds
pub fn current_time_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0)
}
