//! Source of the current instant.
//!
//! Every operation reads the time exactly once from its [`Clock`] so that
//! projection and validation agree on "now" and tests can pin it.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use time::OffsetDateTime;

pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> OffsetDateTime;

    /// The current instant as a chrono UTC timestamp.
    fn now_utc(&self) -> DateTime<Utc> {
        convert_time_to_datetime(self.now())
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl FixedClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        // Nanosecond timestamps overflow past the year 2262.
        let instant = OffsetDateTime::from_unix_timestamp_nanos(
            instant.timestamp_nanos_opt().unwrap_or_default() as i128,
        )
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        Self(instant)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

// Helper function to convert time::OffsetDateTime to chrono::DateTime<Utc>
pub(crate) fn convert_time_to_datetime(time: OffsetDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(time.unix_timestamp(), time.nanosecond()).unwrap_or_default()
}

/// Database representation of an instant; always stored with a UTC offset so
/// text-backed drivers compare timestamps correctly.
pub(crate) fn to_db(instant: DateTime<Utc>) -> DateTimeWithTimeZone {
    instant.fixed_offset()
}
