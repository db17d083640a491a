// Station timestamp parsing
use super::error::TimestampError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Timelike, Utc};

/// Wire format used by station firmware, e.g. `01.01.2024,10:05:00`.
pub const STATION_TIME_FORMAT: &str = "%d.%m.%Y,%H:%M:%S";

/// Parse a station timestamp. No timezone is encoded, so the result is naive.
///
/// Seconds run 0..=59; chrono's leap-second reading of `:60` is rejected.
pub fn parse(text: &str) -> Result<NaiveDateTime, TimestampError> {
    NaiveDateTime::parse_from_str(text, STATION_TIME_FORMAT)
        .ok()
        .filter(|parsed| parsed.nanosecond() < 1_000_000_000)
        .ok_or_else(|| TimestampError::Malformed(text.to_string()))
}

/// Converts station-local timestamps into UTC instants using a fixed station offset.
#[derive(Debug, Clone, Copy)]
pub struct TimestampNormalizer {
    offset: FixedOffset,
}

impl TimestampNormalizer {
    pub fn new(utc_offset_minutes: i32) -> Result<Self, TimestampError> {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(TimestampError::InvalidOffset(utc_offset_minutes))?;
        Ok(Self { offset })
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn normalize(&self, text: &str) -> Result<DateTime<Utc>, TimestampError> {
        let naive = parse(text)?;
        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| TimestampError::Malformed(text.to_string()))
    }
}

impl Default for TimestampNormalizer {
    fn default() -> Self {
        Self::utc()
    }
}
