//! Weekly session model and the future class projector.
//!
//! A cohort's timetable is a set of [`WeeklySession`]s. The projector expands
//! them into concrete, dated [`FutureClass`]es inside the reschedule window:
//! strictly more than the lead time away, no further out than the lookahead,
//! strictly after the cohort start, and not already claimed by a request.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use serde::Serialize;
use tracing::debug;

use crate::entity::reschedule_request::{self, RequestStatus};
use crate::entity::{teacher, weekly_session};
use crate::policy::ReschedulePolicy;

/// Teacher staffing a weekly session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionTeacher {
    pub id: String,
    pub name: Option<String>,
    #[serde(skip)]
    pub email: Option<String>,
}

/// A recurring class slot, as configured for a cohort.
///
/// Fields are kept as entered; [`WeeklySession::slot`] canonicalizes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySession {
    pub id: String,
    pub cohort_id: String,
    pub day_of_week: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub teacher: Option<SessionTeacher>,
}

impl From<(weekly_session::Model, Option<teacher::Model>)> for WeeklySession {
    fn from((session, teacher): (weekly_session::Model, Option<teacher::Model>)) -> Self {
        Self {
            id: session.id,
            cohort_id: session.cohort_id,
            day_of_week: session.day_of_week,
            start_time: session.start_time,
            end_time: session.end_time,
            teacher: teacher.map(|t| SessionTeacher {
                id: t.id,
                name: t.name,
                email: t.email,
            }),
        }
    }
}

/// Canonical weekday and minute-precision times of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSlot {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WeeklySession {
    /// `None` when the day or either time is missing or unrecognized.
    pub fn slot(&self) -> Option<SessionSlot> {
        Some(SessionSlot {
            weekday: parse_weekday(self.day_of_week.as_deref()?)?,
            start: parse_wall_time(self.start_time.as_deref()?)?,
            end: parse_wall_time(self.end_time.as_deref()?)?,
        })
    }
}

/// Case-insensitive English weekday name.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let weekday = match name.trim().to_ascii_lowercase().as_str() {
        "sunday" => Weekday::Sun,
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        _ => return None,
    };
    Some(weekday)
}

/// Sunday = 0 through Saturday = 6.
pub fn weekday_index(weekday: Weekday) -> u32 {
    weekday.num_days_from_sunday()
}

/// Parses `HH:MM` or `HH:MM:SS`, dropping seconds.
pub fn parse_wall_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    let time = NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()?;
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeacherRef {
    pub id: String,
    pub name: Option<String>,
}

/// One dated occurrence of a weekly session. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureClass {
    pub date: DateTime<Utc>,
    /// `HH:MM`, school-local.
    pub start_time: String,
    pub end_time: String,
    pub teacher: Option<TeacherRef>,
    pub weekly_session_id: String,
    pub cohort_id: String,
}

/// Instant of `time` on `day` on the school's wall clock.
pub(crate) fn school_instant(day: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&day.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// Expands `sessions` into the classes a student may still ask to move.
///
/// `existing_requests` is the student's request history; any occurrence
/// claimed by a request that is not cancelled is left out. The result is
/// sorted by date, ties broken by session id.
pub fn generate_future_classes(
    sessions: &[WeeklySession],
    cohort_id: &str,
    cohort_start: Option<NaiveDate>,
    existing_requests: &[reschedule_request::Model],
    now: DateTime<Utc>,
    policy: &ReschedulePolicy,
) -> Vec<FutureClass> {
    let offset = policy.school_offset();
    let min_allowed = now + policy.lead_time();
    let max_allowed = now + policy.lookahead();
    let cohort_start = cohort_start.and_then(|day| school_instant(day, NaiveTime::MIN, offset));

    let claimed: HashSet<DateTime<Utc>> = existing_requests
        .iter()
        .filter(|request| request.status != RequestStatus::Cancelled)
        .map(|request| request.original_class_date.with_timezone(&Utc))
        .collect();

    let days = scan_days(now, max_allowed, offset);
    let mut classes = Vec::new();

    for session in sessions {
        let Some(slot) = session.slot() else {
            debug!(
                "skipping weekly session {} with incomplete schedule ({:?} {:?}-{:?})",
                session.id, session.day_of_week, session.start_time, session.end_time
            );
            continue;
        };

        for day in days.iter().filter(|day| day.weekday() == slot.weekday) {
            let Some(candidate) = school_instant(*day, slot.start, offset) else {
                continue;
            };
            let in_window = candidate > min_allowed && candidate <= max_allowed;
            let after_start = cohort_start.map_or(true, |start| candidate > start);
            if !in_window || !after_start || claimed.contains(&candidate) {
                continue;
            }
            classes.push(FutureClass {
                date: candidate,
                start_time: slot.start.format("%H:%M").to_string(),
                end_time: slot.end.format("%H:%M").to_string(),
                teacher: session.teacher.as_ref().map(|t| TeacherRef {
                    id: t.id.clone(),
                    name: t.name.clone(),
                }),
                weekly_session_id: session.id.clone(),
                cohort_id: cohort_id.to_string(),
            });
        }
    }

    classes.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.weekly_session_id.cmp(&b.weekly_session_id))
    });
    classes
}

/// School-local calendar days from the day containing `now` through the day
/// containing `until`.
fn scan_days(now: DateTime<Utc>, until: DateTime<Utc>, offset: FixedOffset) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = now.with_timezone(&offset).date_naive();
    while school_instant(day, NaiveTime::MIN, offset).is_some_and(|midnight| midnight <= until) {
        days.push(day);
        day = match day.checked_add_signed(Duration::days(1)) {
            Some(next) => next,
            None => break,
        };
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;

    #[test]
    fn weekday_names_are_case_insensitive() {
        assert_eq!(parse_weekday("Tuesday"), Some(Weekday::Tue));
        assert_eq!(parse_weekday("  SATURDAY "), Some(Weekday::Sat));
        assert_eq!(parse_weekday("tues"), None);
        assert_eq!(parse_weekday(""), None);
    }

    #[test]
    fn weekday_index_starts_on_sunday() {
        assert_eq!(weekday_index(Weekday::Sun), 0);
        assert_eq!(weekday_index(Weekday::Wed), 3);
        assert_eq!(weekday_index(Weekday::Sat), 6);
    }

    #[test]
    fn wall_time_drops_seconds() {
        assert_eq!(parse_wall_time("10:00"), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(parse_wall_time("18:45:59"), NaiveTime::from_hms_opt(18, 45, 0));
        assert_eq!(parse_wall_time("25:00"), None);
        assert_eq!(parse_wall_time("ten"), None);
    }

    #[test]
    fn slot_requires_all_three_fields() {
        let mut session = WeeklySession {
            id: "ws".into(),
            cohort_id: "c".into(),
            day_of_week: Some("monday".into()),
            start_time: Some("09:00".into()),
            end_time: None,
            teacher: None,
        };
        assert!(session.slot().is_none());
        session.end_time = Some("10:00".into());
        assert_eq!(session.slot().map(|s| s.weekday), Some(Weekday::Mon));
    }

    #[test]
    fn scan_reaches_the_day_of_the_ceiling() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let days = scan_days(now, now + Duration::weeks(2), Utc.fix());
        assert_eq!(days.len(), 15);
        assert_eq!(days.first(), NaiveDate::from_ymd_opt(2025, 1, 1).as_ref());
        assert_eq!(days.last(), NaiveDate::from_ymd_opt(2025, 1, 15).as_ref());
    }

    #[test]
    fn a_class_exactly_at_the_ceiling_is_offered() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let session = WeeklySession {
            id: "ws".into(),
            cohort_id: "c".into(),
            day_of_week: Some("Wednesday".into()),
            start_time: Some("00:00".into()),
            end_time: Some("01:00".into()),
            teacher: None,
        };
        let classes = generate_future_classes(&[session], "c", None, &[], now, &ReschedulePolicy::default());
        let dates: Vec<_> = classes.iter().map(|c| c.date).collect();
        assert_eq!(
            dates,
            vec![
                Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap(),
            ]
        );
    }
}
