//! Runtime configuration for the reschedule rules.
//!
//! Settings are read with the `config` crate from `RESCHEDULE_*` environment
//! variables, e.g. `RESCHEDULE_LEAD_TIME_HOURS=48`. Unset keys keep their
//! default.

use chrono::{Duration, FixedOffset, Offset, Utc};
use config::{Config, Environment};
use serde::Deserialize;
use thiserror::Error;

use crate::entity::enrollment::EnrollmentStatus;

/// Prefix of the environment variables read by [`ReschedulePolicy::from_env`].
pub const ENV_PREFIX: &str = "RESCHEDULE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid reschedule configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("{key} is out of range: {value}")]
    OutOfRange { key: &'static str, value: i64 },
}

/// Raw settings as found in the environment.
#[derive(Debug, Clone, Default, Deserialize)]
struct PolicySettings {
    lead_time_hours: Option<i64>,
    lookahead_days: Option<i64>,
    rate_limit_window_days: Option<i64>,
    max_pending_requests: Option<i64>,
    school_utc_offset_minutes: Option<i64>,
}

/// Tunable limits applied by the projector and the reschedule workflow.
///
/// The defaults are the school's published rules: requests need more than 24
/// hours notice, may target classes up to two weeks ahead, and a student can
/// have at most three pending requests submitted in any two-week window.
///
/// ```
/// use chrono::Duration;
/// use reschedule_seaorm::ReschedulePolicy;
///
/// let policy = ReschedulePolicy::default()
///     .with_lead_time(Duration::hours(48))
///     .with_max_pending_requests(2);
/// assert_eq!(policy.max_pending_requests(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReschedulePolicy {
    lead_time: Duration,
    lookahead: Duration,
    rate_limit_window: Duration,
    max_pending_requests: u64,
    school_offset: FixedOffset,
    eligible_statuses: Vec<EnrollmentStatus>,
}

impl Default for ReschedulePolicy {
    fn default() -> Self {
        Self {
            lead_time: Duration::hours(24),
            lookahead: Duration::weeks(2),
            rate_limit_window: Duration::weeks(2),
            max_pending_requests: 3,
            school_offset: utc(),
            eligible_statuses: vec![EnrollmentStatus::Paid, EnrollmentStatus::WelcomePackageSent],
        }
    }
}

impl ReschedulePolicy {
    /// Defaults overlaid with any `RESCHEDULE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Self::from_config(settings)
    }

    /// Defaults overlaid with the keys present in `settings`
    /// (`lead_time_hours`, `lookahead_days`, `rate_limit_window_days`,
    /// `max_pending_requests`, `school_utc_offset_minutes`).
    pub fn from_config(settings: Config) -> Result<Self, ConfigError> {
        let settings: PolicySettings = settings.try_deserialize()?;
        let mut policy = Self::default();

        if let Some(hours) = non_negative("lead_time_hours", settings.lead_time_hours)? {
            policy.lead_time = Duration::try_hours(hours).ok_or(ConfigError::OutOfRange {
                key: "lead_time_hours",
                value: hours,
            })?;
        }
        if let Some(days) = non_negative("lookahead_days", settings.lookahead_days)? {
            policy.lookahead = Duration::try_days(days).ok_or(ConfigError::OutOfRange {
                key: "lookahead_days",
                value: days,
            })?;
        }
        if let Some(days) = non_negative("rate_limit_window_days", settings.rate_limit_window_days)? {
            policy.rate_limit_window = Duration::try_days(days).ok_or(ConfigError::OutOfRange {
                key: "rate_limit_window_days",
                value: days,
            })?;
        }
        if let Some(max) = non_negative("max_pending_requests", settings.max_pending_requests)? {
            policy.max_pending_requests = max.unsigned_abs();
        }
        if let Some(minutes) = settings.school_utc_offset_minutes {
            policy.school_offset = minutes
                .checked_mul(60)
                .and_then(|secs| i32::try_from(secs).ok())
                .and_then(FixedOffset::east_opt)
                .ok_or(ConfigError::OutOfRange {
                    key: "school_utc_offset_minutes",
                    value: minutes,
                })?;
        }
        Ok(policy)
    }

    pub fn with_lead_time(mut self, lead_time: Duration) -> Self {
        self.lead_time = lead_time;
        self
    }

    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_rate_limit_window(mut self, window: Duration) -> Self {
        self.rate_limit_window = window;
        self
    }

    pub fn with_max_pending_requests(mut self, max: u64) -> Self {
        self.max_pending_requests = max;
        self
    }

    /// Offset of the school's wall clock, used to place weekly session times.
    pub fn with_school_offset(mut self, offset: FixedOffset) -> Self {
        self.school_offset = offset;
        self
    }

    pub fn with_eligible_statuses(mut self, statuses: Vec<EnrollmentStatus>) -> Self {
        self.eligible_statuses = statuses;
        self
    }

    pub fn lead_time(&self) -> Duration {
        self.lead_time
    }

    pub fn lookahead(&self) -> Duration {
        self.lookahead
    }

    pub fn rate_limit_window(&self) -> Duration {
        self.rate_limit_window
    }

    pub fn max_pending_requests(&self) -> u64 {
        self.max_pending_requests
    }

    pub fn school_offset(&self) -> FixedOffset {
        self.school_offset
    }

    pub fn eligible_statuses(&self) -> &[EnrollmentStatus] {
        &self.eligible_statuses
    }
}

fn non_negative(key: &'static str, value: Option<i64>) -> Result<Option<i64>, ConfigError> {
    match value {
        Some(value) if value < 0 => Err(ConfigError::OutOfRange { key, value }),
        other => Ok(other),
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}
