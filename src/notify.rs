//! Teacher notifications and the outbox that carries them.
//!
//! The workflow never talks to a mail service directly. After a request is
//! stored it writes a [`RescheduleNotification`] into the
//! `notification_outbox` table; an [`OutboxDispatcher`] picks queued rows up
//! later and hands them to a [`Notifier`]. Delivery failures are logged and
//! retried up to a limit, and never reach the student.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::clock::{to_db, Clock, SystemClock};
use crate::entity::notification_outbox::{
    self, ActiveModel as OutboxActiveModel, Column, Entity as OutboxEntity,
};
use crate::entity::{cohort, reschedule_request, student};
use crate::schedule::WeeklySession;

/// Outbox `kind` of [`RescheduleNotification`] messages.
pub const RESCHEDULE_REQUEST_KIND: &str = "reschedule_request_created";

/// What the teacher is told about a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleNotification {
    pub request_id: String,
    pub teacher_email: String,
    pub teacher_name: String,
    pub student_name: String,
    pub cohort_name: String,
    /// e.g. `Tuesday, January 7, 2025`
    pub original_class_date: String,
    /// `HH:MM`
    pub original_class_time: String,
    pub proposed_datetime: String,
    pub reason: Option<String>,
}

impl RescheduleNotification {
    /// Builds the message for the teacher of the first weekly session that
    /// has a teacher with an email address. `None` when nobody can be told.
    pub fn for_request(
        request: &reschedule_request::Model,
        student: &student::Model,
        cohort: &cohort::Model,
        sessions: &[WeeklySession],
        school_offset: FixedOffset,
    ) -> Option<Self> {
        let (teacher, email) = sessions
            .iter()
            .filter_map(|session| session.teacher.as_ref())
            .find_map(|teacher| {
                let email = teacher.email.as_deref()?.trim();
                (!email.is_empty()).then(|| (teacher, email.to_string()))
            })?;

        let local = request
            .original_class_date
            .with_timezone(&Utc)
            .with_timezone(&school_offset);

        Some(Self {
            request_id: request.id.clone(),
            teacher_email: email,
            teacher_name: teacher.name.clone().unwrap_or_else(|| "Teacher".to_string()),
            student_name: student.display_name().to_string(),
            cohort_name: cohort.label().to_string(),
            original_class_date: local.format("%A, %B %-d, %Y").to_string(),
            original_class_time: local.format("%H:%M").to_string(),
            proposed_datetime: request.proposed_datetime.clone(),
            reason: request.reason.clone(),
        })
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers notifications, typically by email.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_reschedule_request_notification(
        &self,
        notification: &RescheduleNotification,
    ) -> Result<(), NotifyError>;
}

/// A [`Notifier`] that only writes the message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_reschedule_request_notification(
        &self,
        notification: &RescheduleNotification,
    ) -> Result<(), NotifyError> {
        info!(
            "reschedule request {} for {} on {} at {}: notify {} <{}>",
            notification.request_id,
            notification.student_name,
            notification.original_class_date,
            notification.original_class_time,
            notification.teacher_name,
            notification.teacher_email
        );
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("failed to encode outbox payload: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode outbox payload: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("unsupported outbox message kind {0:?}")]
    UnknownKind(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Queues `notification` for delivery.
pub async fn enqueue<C: ConnectionTrait>(
    conn: &C,
    notification: &RescheduleNotification,
    now: DateTime<Utc>,
) -> Result<notification_outbox::Model, OutboxError> {
    // Serialize the notification using MessagePack
    let payload = rmp_serde::to_vec(notification)?;

    let message = OutboxActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        kind: Set(RESCHEDULE_REQUEST_KIND.to_string()),
        payload: Set(payload),
        attempts: Set(0),
        last_error: Set(None),
        created_at: Set(to_db(now)),
        delivered_at: Set(None),
    };
    Ok(message.insert(conn).await?)
}

fn decode(message: &notification_outbox::Model) -> Result<RescheduleNotification, OutboxError> {
    if message.kind != RESCHEDULE_REQUEST_KIND {
        return Err(OutboxError::UnknownKind(message.kind.clone()));
    }
    Ok(rmp_serde::from_slice(&message.payload)?)
}

/// Counts from one [`OutboxDispatcher::dispatch_pending`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Drains the notification outbox.
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use reschedule_seaorm::{LogNotifier, OutboxDispatcher};
///
/// # async fn example(conn: sea_orm::DatabaseConnection) {
/// let handle = OutboxDispatcher::new(conn, Arc::new(LogNotifier))
///     .with_max_attempts(5)
///     .spawn(Duration::from_secs(30));
/// # handle.abort();
/// # }
/// ```
#[derive(Clone)]
pub struct OutboxDispatcher {
    conn: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    batch_size: u64,
    max_attempts: i32,
}

impl std::fmt::Debug for OutboxDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxDispatcher")
            .field("batch_size", &self.batch_size)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl OutboxDispatcher {
    pub fn new(conn: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            conn,
            notifier,
            clock: Arc::new(SystemClock),
            batch_size: 50,
            max_attempts: 5,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Maximum number of messages handled per pass.
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Messages that failed this many times are left alone.
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delivers queued messages, oldest first.
    pub async fn dispatch_pending(&self) -> Result<DispatchReport, DbErr> {
        let queued = OutboxEntity::find()
            .filter(Column::DeliveredAt.is_null())
            .filter(Column::Attempts.lt(self.max_attempts))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .limit(self.batch_size)
            .all(&self.conn)
            .await?;

        let mut report = DispatchReport::default();
        for message in queued {
            let outcome = match decode(&message) {
                Ok(notification) => self
                    .notifier
                    .send_reschedule_request_notification(&notification)
                    .await
                    .map_err(|err| (err.to_string(), false)),
                // Undecodable payloads will never succeed.
                Err(err) => Err((err.to_string(), true)),
            };

            let now = to_db(self.clock.now_utc());
            let id = message.id.clone();
            let attempts = message.attempts + 1;
            let mut active = message.into_active_model();
            active.attempts = Set(attempts);
            match outcome {
                Ok(()) => {
                    active.delivered_at = Set(Some(now));
                    active.last_error = Set(None);
                    info!("delivered outbox message {} after {} attempt(s)", id, attempts);
                    report.delivered += 1;
                }
                Err((reason, poisoned)) => {
                    error!("outbox message {} failed (attempt {}): {}", id, attempts, reason);
                    if poisoned {
                        active.attempts = Set(self.max_attempts.max(attempts));
                    }
                    active.last_error = Set(Some(reason));
                    report.failed += 1;
                }
            }
            active.update(&self.conn).await?;
        }
        Ok(report)
    }

    /// Runs [`OutboxDispatcher::dispatch_pending`] every `every` on a tokio task.
    pub fn spawn(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(err) = self.dispatch_pending().await {
                    error!("outbox dispatch failed: {}", err);
                }
            }
        })
    }
}
