//! Teacher entity model.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "teacher")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::weekly_session::Entity")]
    WeeklySession,
}

impl Related<super::weekly_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WeeklySession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
