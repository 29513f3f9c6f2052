//! SeaORM Entity for the infractions table
//!
//! Rows are never updated after creation. The only removal path is the
//! deletion workflow, which records a snapshot before the row goes away.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Disciplinary severity. The three values are a closed set; anything else
/// coming in from a form is coerced to Leve by the caller, with a warning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "severity")]
pub enum Severity {
    #[sea_orm(string_value = "Leve")]
    Leve,
    #[sea_orm(string_value = "Média")]
    Media,
    #[sea_orm(string_value = "Grave")]
    Grave,
}

impl Severity {
    /// Parse a form value. Returns None for anything outside the closed set;
    /// the coercion decision (and its warning) belongs to the caller.
    pub fn from_form(value: &str) -> Option<Self> {
        match value {
            "Leve" => Some(Self::Leve),
            "Média" => Some(Self::Media),
            "Grave" => Some(Self::Grave),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leve => "Leve",
            Self::Media => "Média",
            Self::Grave => "Grave",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "infractions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub garrison_id: i32,
    pub officer_id: String,
    pub officer_name: String,
    pub punishment_type: String,
    #[sea_orm(column_type = "Text")]
    pub evidence: String,
    pub severity: Severity,
    /// Display name of the user who registered the infraction.
    pub registered_by: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::garrisons::Entity",
        from = "Column::GarrisonId",
        to = "super::garrisons::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Garrison,
}

impl Related<super::garrisons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Garrison.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
