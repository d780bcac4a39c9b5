//! Error taxonomy for the reschedule workflow.
//!
//! Every business-rule violation has its own [`RescheduleError`] variant whose
//! `Display` text is written for the student. Callers that need a stable code
//! use [`RescheduleError::kind`].

use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, RescheduleError>;

/// Stable discriminant of a [`RescheduleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Unauthorized,
    StudentNotFound,
    NoActiveEnrollment,
    NotPrivateFormat,
    InvalidInput,
    TooSoon,
    TooFarAhead,
    DuplicateRequest,
    RateLimitExceeded,
    NotFound,
    Forbidden,
    InvalidState,
    StorageError,
}

#[derive(Debug, Error)]
pub enum RescheduleError {
    #[error("You need to be signed in to manage reschedule requests")]
    Unauthorized,

    #[error("No student profile is linked to this account")]
    StudentNotFound,

    #[error("You don't have an active enrollment in this cohort")]
    NoActiveEnrollment,

    #[error("Rescheduling is only available for private classes")]
    NotPrivateFormat,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Classes must be more than {} away to reschedule", describe_minutes(.minutes))]
    TooSoon { minutes: i64 },

    #[error("Classes can only be rescheduled up to {} in advance", describe_minutes(.minutes))]
    TooFarAhead { minutes: i64 },

    #[error("You have already requested to reschedule this class")]
    DuplicateRequest,

    #[error(
        "You can have at most {limit} pending reschedule requests within {}; \
         please wait for your current requests to be reviewed",
        describe_minutes(.window_minutes)
    )]
    RateLimitExceeded { limit: u64, window_minutes: i64 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("You can only cancel your own reschedule requests")]
    Forbidden,

    #[error("Only pending requests can be cancelled")]
    InvalidState,

    #[error("storage error: {0}")]
    Storage(#[from] DbErr),
}

impl RescheduleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RescheduleError::Unauthorized => ErrorKind::Unauthorized,
            RescheduleError::StudentNotFound => ErrorKind::StudentNotFound,
            RescheduleError::NoActiveEnrollment => ErrorKind::NoActiveEnrollment,
            RescheduleError::NotPrivateFormat => ErrorKind::NotPrivateFormat,
            RescheduleError::InvalidInput(_) => ErrorKind::InvalidInput,
            RescheduleError::TooSoon { .. } => ErrorKind::TooSoon,
            RescheduleError::TooFarAhead { .. } => ErrorKind::TooFarAhead,
            RescheduleError::DuplicateRequest => ErrorKind::DuplicateRequest,
            RescheduleError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            RescheduleError::NotFound(_) => ErrorKind::NotFound,
            RescheduleError::Forbidden => ErrorKind::Forbidden,
            RescheduleError::InvalidState => ErrorKind::InvalidState,
            RescheduleError::Storage(_) => ErrorKind::StorageError,
        }
    }

    /// Maps an insert failure, turning a unique-index hit into
    /// [`RescheduleError::DuplicateRequest`].
    pub(crate) fn from_insert(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => RescheduleError::DuplicateRequest,
            _ => RescheduleError::Storage(err),
        }
    }
}

/// Whether the database aborted a transaction over a concurrent conflict
/// (PostgreSQL `serialization_failure` or `deadlock_detected`). Such a
/// transaction can simply be run again.
pub(crate) fn is_serialization_failure(err: &DbErr) -> bool {
    let (DbErr::Exec(runtime) | DbErr::Query(runtime) | DbErr::Conn(runtime)) = err else {
        return false;
    };
    match runtime {
        RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(db)) => {
            matches!(db.code().as_deref(), Some("40001" | "40P01"))
        }
        _ => false,
    }
}

/// Whole days when the span is a multiple of a day, else hours and minutes:
/// `14 days`, `24 hours`, `1 hour 30 minutes`.
fn describe_minutes(minutes: &i64) -> String {
    let minutes = *minutes;
    const DAY: i64 = 24 * 60;
    if minutes > 0 && minutes % DAY == 0 && minutes / DAY != 1 {
        return plural(minutes / DAY, "day");
    }
    let (hours, rest) = (minutes / 60, minutes % 60);
    match (hours, rest) {
        (0, rest) => plural(rest, "minute"),
        (hours, 0) => plural(hours, "hour"),
        (hours, rest) => format!("{} {}", plural(hours, "hour"), plural(rest, "minute")),
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

const GENERIC_FAILURE: &str = "Something went wrong, please try again later";

/// Caller-facing result shape: `{"success": true, "data": ...}` or
/// `{"success": false, "error": "TooSoon", "message": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct RescheduleResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> From<Result<T>> for RescheduleResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
                message: None,
            },
            Err(err) => {
                let message = match &err {
                    RescheduleError::Storage(db) => {
                        error!("reschedule operation failed: {}", db);
                        GENERIC_FAILURE.to_string()
                    }
                    other => other.to_string(),
                };
                Self {
                    success: false,
                    data: None,
                    error: Some(err.kind()),
                    message: Some(message),
                }
            }
        }
    }
}
