//! Read access to enrollments, cohorts and their weekly sessions.

use chrono::NaiveDate;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};

use crate::entity::enrollment::{self, EnrollmentStatus};
use crate::entity::product::{self, ProductFormat};
use crate::entity::{cohort, teacher, weekly_session};
use crate::error::{RescheduleError, Result};
use crate::policy::ReschedulePolicy;
use crate::schedule::WeeklySession;

/// An enrollment in an eligible status, with its cohort and product format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEnrollment {
    pub enrollment: enrollment::Model,
    pub cohort: cohort::Model,
    /// `None` when the cohort has no linked product.
    pub format: Option<ProductFormat>,
}

/// Everything the projector needs about a student's private cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateEnrollment {
    pub enrollment_id: String,
    pub cohort: cohort::Model,
    pub product_format: ProductFormat,
    pub weekly_sessions: Vec<WeeklySession>,
}

impl PrivateEnrollment {
    pub fn cohort_id(&self) -> &str {
        &self.cohort.id
    }

    pub fn cohort_start_date(&self) -> Option<NaiveDate> {
        self.cohort.start_date
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnrollmentStore<'c, C> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> EnrollmentStore<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    /// The student's enrollment on `cohort_id` whose status is one of
    /// `statuses`, if any.
    pub async fn find_active_enrollment(
        &self,
        student_id: &str,
        cohort_id: &str,
        statuses: &[EnrollmentStatus],
    ) -> std::result::Result<Option<ActiveEnrollment>, DbErr> {
        let found = enrollment::Entity::find()
            .filter(enrollment::Column::StudentId.eq(student_id))
            .filter(enrollment::Column::CohortId.eq(cohort_id))
            .filter(enrollment::Column::Status.is_in(statuses.iter().copied()))
            .order_by_asc(enrollment::Column::Id)
            .find_also_related(cohort::Entity)
            .one(self.conn)
            .await?;

        let Some((enrollment, Some(cohort))) = found else {
            return Ok(None);
        };

        let format = match &cohort.product_id {
            Some(product_id) => product::Entity::find_by_id(product_id.clone())
                .one(self.conn)
                .await?
                .map(|product| product.format),
            None => None,
        };

        Ok(Some(ActiveEnrollment {
            enrollment,
            cohort,
            format,
        }))
    }

    /// Weekly sessions of a cohort with their teachers, in id order.
    pub async fn find_weekly_sessions_with_teacher(
        &self,
        cohort_id: &str,
    ) -> std::result::Result<Vec<WeeklySession>, DbErr> {
        let rows = weekly_session::Entity::find()
            .filter(weekly_session::Column::CohortId.eq(cohort_id))
            .order_by_asc(weekly_session::Column::Id)
            .find_also_related(teacher::Entity)
            .all(self.conn)
            .await?;
        Ok(rows.into_iter().map(WeeklySession::from).collect())
    }

    /// Active enrollment that must belong to a private cohort.
    pub async fn require_private_enrollment(
        &self,
        student_id: &str,
        cohort_id: &str,
        policy: &ReschedulePolicy,
    ) -> Result<ActiveEnrollment> {
        let active = self
            .find_active_enrollment(student_id, cohort_id, policy.eligible_statuses())
            .await?
            .ok_or(RescheduleError::NoActiveEnrollment)?;
        if active.format != Some(ProductFormat::Private) {
            return Err(RescheduleError::NotPrivateFormat);
        }
        Ok(active)
    }

    /// [`EnrollmentStore::require_private_enrollment`] plus the cohort's
    /// weekly sessions.
    pub async fn load_private_enrollment(
        &self,
        student_id: &str,
        cohort_id: &str,
        policy: &ReschedulePolicy,
    ) -> Result<PrivateEnrollment> {
        let active = self
            .require_private_enrollment(student_id, cohort_id, policy)
            .await?;
        let weekly_sessions = self.find_weekly_sessions_with_teacher(cohort_id).await?;
        Ok(PrivateEnrollment {
            enrollment_id: active.enrollment.id,
            cohort: active.cohort,
            product_format: ProductFormat::Private,
            weekly_sessions,
        })
    }
}
