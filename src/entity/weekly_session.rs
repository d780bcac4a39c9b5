//! Weekly session entity model.

use sea_orm::entity::prelude::*;

/// A recurring class slot of a cohort.
///
/// Day and time columns are nullable because cohort configuration is edited
/// by hand; rows missing any of them are skipped when projecting classes.
///
/// # Database Schema
///
/// | Column      | Type               | Description                         |
/// |-------------|--------------------|-------------------------------------|
/// | id          | TEXT (Primary Key) | Session ID                          |
/// | cohort_id   | TEXT               | Owning cohort                       |
/// | day_of_week | TEXT NULL          | Weekday name, any case              |
/// | start_time  | TEXT NULL          | `HH:MM[:SS]`, school-local          |
/// | end_time    | TEXT NULL          | `HH:MM[:SS]`, school-local          |
/// | teacher_id  | TEXT NULL          | Assigned teacher, if staffed        |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "weekly_session")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    pub cohort_id: String,
    pub day_of_week: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub teacher_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cohort::Entity",
        from = "Column::CohortId",
        to = "super::cohort::Column::Id"
    )]
    Cohort,
    #[sea_orm(
        belongs_to = "super::teacher::Entity",
        from = "Column::TeacherId",
        to = "super::teacher::Column::Id"
    )]
    Teacher,
}

impl Related<super::cohort::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cohort.def()
    }
}

impl Related<super::teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
