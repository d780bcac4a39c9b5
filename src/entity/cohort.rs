//! Cohort entity model.

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing a cohort.
///
/// # Database Schema
///
/// | Column       | Type               | Description                        |
/// |--------------|--------------------|------------------------------------|
/// | id           | TEXT (Primary Key) | Cohort ID                          |
/// | nickname     | TEXT NULL          | Short label used in communications |
/// | display_name | TEXT NULL          | Full cohort name                   |
/// | start_date   | DATE NULL          | First day of classes               |
/// | product_id   | TEXT NULL          | Linked product (format lives there)|
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cohort")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    pub nickname: Option<String>,
    pub display_name: Option<String>,
    /// Classes on or before this date are never offered for rescheduling.
    pub start_date: Option<Date>,
    pub product_id: Option<String>,
}

impl Model {
    /// Label used when talking to teachers about this cohort.
    pub fn label(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.display_name.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or(&self.id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(has_many = "super::weekly_session::Entity")]
    WeeklySession,
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollment,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::weekly_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WeeklySession.def()
    }
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
