//! Reschedule request ledger.
//!
//! Query and write helpers over the `reschedule_request` table. The ledger is
//! generic over [`ConnectionTrait`] so the workflow can run the same checks
//! inside a transaction that it uses for plain reads.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::clock::to_db;
use crate::entity::reschedule_request::{
    self, ActiveModel as RequestActiveModel, Column, Entity as RequestEntity, RequestStatus,
};
use crate::error::{RescheduleError, Result};

/// Fields a student supplies for a new request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRescheduleRequest {
    pub student_id: String,
    pub cohort_id: String,
    pub original_class_date: DateTime<Utc>,
    pub proposed_datetime: String,
    pub reason: Option<String>,
}

/// Filter for [`Ledger::count_where`]. Unset fields do not constrain.
///
/// ```
/// use chrono::Utc;
/// use reschedule_seaorm::entity::reschedule_request::RequestStatus;
/// use reschedule_seaorm::LedgerFilter;
///
/// let filter = LedgerFilter::student("stu_1")
///     .status(RequestStatus::Pending)
///     .since(Utc::now());
/// assert_eq!(filter.student_id, "stu_1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFilter {
    pub student_id: String,
    pub cohort_id: Option<String>,
    pub status: Option<RequestStatus>,
    pub status_not: Option<RequestStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl LedgerFilter {
    pub fn student(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            ..Self::default()
        }
    }

    pub fn cohort(mut self, cohort_id: impl Into<String>) -> Self {
        self.cohort_id = Some(cohort_id.into());
        self
    }

    pub fn status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status_not(mut self, status: RequestStatus) -> Self {
        self.status_not = Some(status);
        self
    }

    /// Only requests created at or after `since`.
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Only requests created at or before `until`.
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }
}

/// A staff decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Approved,
    Rejected,
}

impl From<Resolution> for RequestStatus {
    fn from(value: Resolution) -> Self {
        match value {
            Resolution::Approved => RequestStatus::Approved,
            Resolution::Rejected => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ledger<'c, C> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> Ledger<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    /// Inserts a `pending` request stamped with `now`.
    pub async fn insert(
        &self,
        request: NewRescheduleRequest,
        now: DateTime<Utc>,
    ) -> std::result::Result<reschedule_request::Model, DbErr> {
        self.insert_created_at(request, now).await
    }

    /// Like [`Ledger::insert`] but with an explicit creation time, for
    /// importing history.
    pub async fn insert_created_at(
        &self,
        request: NewRescheduleRequest,
        created_at: DateTime<Utc>,
    ) -> std::result::Result<reschedule_request::Model, DbErr> {
        let created_at = to_db(created_at);
        RequestActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            student_id: Set(request.student_id),
            cohort_id: Set(request.cohort_id),
            original_class_date: Set(to_db(request.original_class_date)),
            proposed_datetime: Set(request.proposed_datetime),
            reason: Set(request.reason),
            status: Set(RequestStatus::Pending),
            admin_notes: Set(None),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        }
        .insert(self.conn)
        .await
    }

    pub async fn find_by_id(
        &self,
        id: &str,
    ) -> std::result::Result<Option<reschedule_request::Model>, DbErr> {
        RequestEntity::find_by_id(id.to_string()).one(self.conn).await
    }

    /// All of a student's requests, newest first.
    pub async fn list_for_student(
        &self,
        student_id: &str,
    ) -> std::result::Result<Vec<reschedule_request::Model>, DbErr> {
        RequestEntity::find()
            .filter(Column::StudentId.eq(student_id))
            .order_by_desc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(self.conn)
            .await
    }

    pub async fn count_where(&self, filter: &LedgerFilter) -> std::result::Result<u64, DbErr> {
        let mut query = RequestEntity::find().filter(Column::StudentId.eq(filter.student_id.as_str()));
        if let Some(cohort_id) = &filter.cohort_id {
            query = query.filter(Column::CohortId.eq(cohort_id.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(Column::Status.eq(status));
        }
        if let Some(status) = filter.status_not {
            query = query.filter(Column::Status.ne(status));
        }
        if let Some(since) = filter.since {
            query = query.filter(Column::CreatedAt.gte(to_db(since)));
        }
        if let Some(until) = filter.until {
            query = query.filter(Column::CreatedAt.lte(to_db(until)));
        }
        query.count(self.conn).await
    }

    /// Whether a request other than `status_not` covers this exact class.
    pub async fn exists_where(
        &self,
        student_id: &str,
        cohort_id: &str,
        original_class_date: DateTime<Utc>,
        status_not: RequestStatus,
    ) -> std::result::Result<bool, DbErr> {
        let count = RequestEntity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::CohortId.eq(cohort_id))
            .filter(Column::OriginalClassDate.eq(to_db(original_class_date)))
            .filter(Column::Status.ne(status_not))
            .count(self.conn)
            .await?;
        Ok(count > 0)
    }

    /// Non-cancelled requests for a student and cohort created since
    /// `window_start`.
    pub async fn count_active_requests_in_period(
        &self,
        student_id: &str,
        cohort_id: &str,
        window_start: DateTime<Utc>,
    ) -> std::result::Result<u64, DbErr> {
        self.count_where(
            &LedgerFilter::student(student_id)
                .cohort(cohort_id)
                .status_not(RequestStatus::Cancelled)
                .since(window_start),
        )
        .await
    }

    pub async fn has_existing_request_for_date(
        &self,
        student_id: &str,
        cohort_id: &str,
        original_class_date: DateTime<Utc>,
    ) -> std::result::Result<bool, DbErr> {
        self.exists_where(
            student_id,
            cohort_id,
            original_class_date,
            RequestStatus::Cancelled,
        )
        .await
    }

    /// Pending requests, across all cohorts, created in `[window_start, now]`.
    pub async fn count_pending_in_window(
        &self,
        student_id: &str,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> std::result::Result<u64, DbErr> {
        self.count_where(
            &LedgerFilter::student(student_id)
                .status(RequestStatus::Pending)
                .since(window_start)
                .until(now),
        )
        .await
    }

    /// Moves a pending request to `cancelled`.
    ///
    /// Returns `false` when no pending request with this id exists, so two
    /// racing cancels cannot both succeed.
    pub async fn cancel(&self, id: &str, now: DateTime<Utc>) -> std::result::Result<bool, DbErr> {
        let result = RequestEntity::update_many()
            .set(RequestActiveModel {
                status: Set(RequestStatus::Cancelled),
                updated_at: Set(to_db(now)),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(RequestStatus::Pending))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Staff transition `pending -> approved | rejected`. Admin notes can only
    /// be written together with this transition.
    pub async fn resolve(
        &self,
        id: &str,
        resolution: Resolution,
        admin_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<reschedule_request::Model> {
        let request = self
            .find_by_id(id)
            .await?
            .ok_or(RescheduleError::NotFound("Reschedule request"))?;
        if request.status.is_terminal() {
            return Err(RescheduleError::InvalidState);
        }

        let result = RequestEntity::update_many()
            .set(RequestActiveModel {
                status: Set(resolution.into()),
                admin_notes: Set(admin_notes),
                updated_at: Set(to_db(now)),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(RequestStatus::Pending))
            .exec(self.conn)
            .await?;
        if result.rows_affected != 1 {
            return Err(RescheduleError::InvalidState);
        }

        self.find_by_id(id)
            .await?
            .ok_or(RescheduleError::NotFound("Reschedule request"))
    }
}
