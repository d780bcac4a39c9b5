//! Product entity model.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How a product is taught. Only [`ProductFormat::Private`] cohorts are
/// eligible for self-service rescheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ProductFormat {
    #[sea_orm(string_value = "private")]
    Private,
    #[sea_orm(string_value = "group")]
    Group,
    #[sea_orm(string_value = "hybrid")]
    Hybrid,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "product")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    pub display_name: String,
    pub format: ProductFormat,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cohort::Entity")]
    Cohort,
}

impl Related<super::cohort::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cohort.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
