//! Student entity model.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "student")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    /// Authentication user this student profile belongs to.
    #[sea_orm(unique)]
    pub user_id: String,
    pub first_name: Option<String>,
    pub full_name: Option<String>,
}

impl Model {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.first_name.as_deref())
            .unwrap_or("A student")
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollment,
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
