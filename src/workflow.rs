//! The reschedule request workflow.
//!
//! [`RescheduleService`] validates a student's request in a fixed order so the
//! reported failure is predictable: caller, enrollment, input format, class
//! window, duplicate, rate limit. Only then is the request written, after
//! which a teacher notification is queued on a best-effort basis.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, IsolationLevel,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::enrollment::{ActiveEnrollment, EnrollmentStore};
use crate::entity::reschedule_request::{self, RequestStatus};
use crate::entity::student;
use crate::error::{is_serialization_failure, RescheduleError, Result};
use crate::identity::{resolve_student, IdentityResolver};
use crate::ledger::{Ledger, NewRescheduleRequest};
use crate::notify::{self, RescheduleNotification};
use crate::policy::ReschedulePolicy;
use crate::schedule::{generate_future_classes, FutureClass};

/// Student input for a new reschedule request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRescheduleRequest {
    pub cohort_id: String,
    /// RFC 3339 instant of the class being moved.
    pub original_class_date: String,
    /// Free text, e.g. "any weekday evening next week".
    pub proposed_datetime: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedRequest {
    pub id: String,
}

/// Reschedule operations backed by a Sea-ORM connection.
///
/// ```no_run
/// use reschedule_seaorm::{CallerIdentity, CreateRescheduleRequest, RescheduleService};
///
/// # async fn example(conn: sea_orm::DatabaseConnection) -> Result<(), Box<dyn std::error::Error>> {
/// let service = RescheduleService::new(conn);
/// let caller = CallerIdentity::user("user_42");
///
/// let created = service
///     .create_reschedule_request(
///         CreateRescheduleRequest {
///             cohort_id: "cohort_1".into(),
///             original_class_date: "2025-01-07T10:00:00Z".into(),
///             proposed_datetime: "Thursday at the same time".into(),
///             reason: None,
///         },
///         &caller,
///     )
///     .await?;
/// service.cancel_reschedule_request(&created.id, &caller).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RescheduleService {
    conn: DatabaseConnection,
    policy: ReschedulePolicy,
    clock: Arc<dyn Clock>,
}

impl RescheduleService {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            policy: ReschedulePolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_policy(mut self, policy: ReschedulePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn policy(&self) -> &ReschedulePolicy {
        &self.policy
    }

    pub fn ledger(&self) -> Ledger<'_, DatabaseConnection> {
        Ledger::new(&self.conn)
    }

    /// Classes of `cohort_id` the caller could ask to move right now.
    pub async fn available_classes(
        &self,
        cohort_id: &str,
        caller: &dyn IdentityResolver,
    ) -> Result<Vec<FutureClass>> {
        let now = self.clock.now_utc();
        let student = resolve_student(&self.conn, caller).await?;
        let enrollment = EnrollmentStore::new(&self.conn)
            .load_private_enrollment(&student.id, cohort_id, &self.policy)
            .await?;
        let history = self.ledger().list_for_student(&student.id).await?;

        Ok(generate_future_classes(
            &enrollment.weekly_sessions,
            enrollment.cohort_id(),
            enrollment.cohort_start_date(),
            &history,
            now,
            &self.policy,
        ))
    }

    /// The caller's requests, newest first.
    pub async fn student_requests(
        &self,
        caller: &dyn IdentityResolver,
    ) -> Result<Vec<reschedule_request::Model>> {
        let student = resolve_student(&self.conn, caller).await?;
        Ok(self.ledger().list_for_student(&student.id).await?)
    }

    pub async fn create_reschedule_request(
        &self,
        input: CreateRescheduleRequest,
        caller: &dyn IdentityResolver,
    ) -> Result<CreatedRequest> {
        let now = self.clock.now_utc();
        let student = resolve_student(&self.conn, caller).await?;
        let active = EnrollmentStore::new(&self.conn)
            .require_private_enrollment(&student.id, &input.cohort_id, &self.policy)
            .await?;

        let original_class_date = parse_class_date(&input.original_class_date)?;
        let proposed_datetime = input.proposed_datetime.trim().to_string();
        if proposed_datetime.is_empty() {
            return Err(RescheduleError::InvalidInput(
                "Please describe when you would like the class to take place".to_string(),
            ));
        }
        self.check_window(original_class_date, now)?;

        let request = self
            .insert_checked(
                NewRescheduleRequest {
                    student_id: student.id.clone(),
                    cohort_id: input.cohort_id,
                    original_class_date,
                    proposed_datetime,
                    reason: input
                        .reason
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty()),
                },
                now,
            )
            .await?;
        info!(
            "student {} requested to reschedule class {} of cohort {} (request {})",
            student.id, request.original_class_date, request.cohort_id, request.id
        );

        self.queue_teacher_notification(&request, &student, &active, now)
            .await;

        Ok(CreatedRequest { id: request.id })
    }

    pub async fn cancel_reschedule_request(
        &self,
        request_id: &str,
        caller: &dyn IdentityResolver,
    ) -> Result<()> {
        let now = self.clock.now_utc();
        let student = resolve_student(&self.conn, caller).await?;
        let ledger = self.ledger();

        let request = ledger
            .find_by_id(request_id)
            .await?
            .ok_or(RescheduleError::NotFound("Reschedule request"))?;
        if request.student_id != student.id {
            return Err(RescheduleError::Forbidden);
        }
        if request.status != RequestStatus::Pending {
            return Err(RescheduleError::InvalidState);
        }
        // Lost a race with another cancel or a staff decision.
        if !ledger.cancel(request_id, now).await? {
            return Err(RescheduleError::InvalidState);
        }

        info!("student {} cancelled reschedule request {}", student.id, request_id);
        Ok(())
    }

    fn check_window(&self, class_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        if class_date <= now + self.policy.lead_time() {
            debug!("class {} is within the lead time", class_date);
            return Err(RescheduleError::TooSoon {
                minutes: self.policy.lead_time().num_minutes(),
            });
        }
        if class_date > now + self.policy.lookahead() {
            debug!("class {} is beyond the lookahead", class_date);
            return Err(RescheduleError::TooFarAhead {
                minutes: self.policy.lookahead().num_minutes(),
            });
        }
        Ok(())
    }

    /// Duplicate check, rate limit and insert in one transaction, rerun when
    /// the database aborts it over a concurrent conflict.
    async fn insert_checked(
        &self,
        request: NewRescheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<reschedule_request::Model> {
        retry_on_conflict(MAX_TRANSACTION_ATTEMPTS, || {
            self.try_insert_checked(request.clone(), now)
        })
        .await
    }

    async fn try_insert_checked(
        &self,
        request: NewRescheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<reschedule_request::Model> {
        let txn = self.begin().await?;
        let ledger = Ledger::new(&txn);

        if ledger
            .has_existing_request_for_date(
                &request.student_id,
                &request.cohort_id,
                request.original_class_date,
            )
            .await?
        {
            return Err(RescheduleError::DuplicateRequest);
        }

        let window_start = now - self.policy.rate_limit_window();
        let pending = ledger
            .count_pending_in_window(&request.student_id, window_start, now)
            .await?;
        if pending >= self.policy.max_pending_requests() {
            debug!(
                "student {} has {} pending requests since {}",
                request.student_id, pending, window_start
            );
            return Err(RescheduleError::RateLimitExceeded {
                limit: self.policy.max_pending_requests(),
                window_minutes: self.policy.rate_limit_window().num_minutes(),
            });
        }

        let created = ledger
            .insert(request, now)
            .await
            .map_err(RescheduleError::from_insert)?;
        txn.commit().await.map_err(RescheduleError::from_insert)?;
        Ok(created)
    }

    async fn begin(&self) -> Result<DatabaseTransaction> {
        let txn = match self.conn.get_database_backend() {
            DbBackend::Postgres => {
                self.conn
                    .begin_with_config(Some(IsolationLevel::Serializable), None)
                    .await?
            }
            DbBackend::Sqlite => {
                let txn = self.conn.begin().await?;
                // Claim the write lock before the first read so concurrent
                // creates run one after another.
                txn.execute_unprepared(SQLITE_WRITE_LOCK).await?;
                txn
            }
            _ => self.conn.begin().await?,
        };
        Ok(txn)
    }

    async fn queue_teacher_notification(
        &self,
        request: &reschedule_request::Model,
        student: &student::Model,
        active: &ActiveEnrollment,
        now: DateTime<Utc>,
    ) {
        let sessions = match EnrollmentStore::new(&self.conn)
            .find_weekly_sessions_with_teacher(&request.cohort_id)
            .await
        {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(
                    "skipping notification for request {}: failed to load sessions: {}",
                    request.id, err
                );
                return;
            }
        };

        let Some(notification) = RescheduleNotification::for_request(
            request,
            student,
            &active.cohort,
            &sessions,
            self.policy.school_offset(),
        ) else {
            warn!(
                "no teacher with an email address for cohort {}; request {} not notified",
                request.cohort_id, request.id
            );
            return;
        };

        if let Err(err) = notify::enqueue(&self.conn, &notification, now).await {
            warn!("failed to queue notification for request {}: {}", request.id, err);
        }
    }
}

/// Attempts at a create transaction before a conflict is reported.
const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

/// A write that touches no rows. SQLite's `BEGIN` is deferred, so this moves
/// the lock acquisition to the start of the transaction.
const SQLITE_WRITE_LOCK: &str = "UPDATE reschedule_request SET id = id WHERE 0";

/// Runs `attempt` up to `attempts` times while it fails with a serialization
/// conflict. Any other outcome is returned as is.
async fn retry_on_conflict<T, F, Fut>(attempts: u32, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(RescheduleError::Storage(err))
                if tries < attempts && is_serialization_failure(&err) =>
            {
                warn!("transaction conflict on attempt {}, retrying: {}", tries, err);
                tries += 1;
            }
            result => return result,
        }
    }
}

fn parse_class_date(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| {
            RescheduleError::InvalidInput(format!(
                "{raw:?} is not a valid class date; expected an ISO 8601 timestamp"
            ))
        })
}
