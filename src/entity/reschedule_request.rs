//! Reschedule request entity model for Sea-ORM database interaction.
//!
//! Each row records a student's wish to move one concrete class occurrence.
//! The pair of `student_id`/`cohort_id` plus `original_class_date` identifies
//! that occurrence; a partial unique index keeps at most one non-cancelled row
//! per occurrence (see [`crate::migration`]).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of a reschedule request.
///
/// `Pending` is the only non-terminal state. Students may move a pending
/// request to `Cancelled`; staff move it to `Approved` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// Sea-ORM entity model representing a reschedule request.
///
/// # Database Schema
///
/// | Column              | Type               | Description                           |
/// |---------------------|--------------------|---------------------------------------|
/// | id                  | TEXT (Primary Key) | Request ID (UUID v4)                  |
/// | student_id          | TEXT               | Requesting student                    |
/// | cohort_id           | TEXT               | Cohort the class belongs to           |
/// | original_class_date | TIMESTAMPTZ        | Start of the class being moved        |
/// | proposed_datetime   | TEXT               | Free-text wish for the new time       |
/// | reason              | TEXT NULL          | Optional explanation                  |
/// | status              | VARCHAR(16)        | `pending`/`approved`/`rejected`/...   |
/// | admin_notes         | TEXT NULL          | Set by staff when resolving           |
/// | created_at          | TIMESTAMPTZ        | Submission time                       |
/// | updated_at          | TIMESTAMPTZ        | Refreshed on every status change      |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reschedule_request")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    pub student_id: String,
    pub cohort_id: String,
    pub original_class_date: DateTimeWithTimeZone,
    pub proposed_datetime: String,
    pub reason: Option<String>,
    pub status: RequestStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::cohort::Entity",
        from = "Column::CohortId",
        to = "super::cohort::Column::Id"
    )]
    Cohort,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::cohort::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cohort.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
