//! SeaORM Entity for the audit_logs table
//!
//! Append-only. Rows are never mutated; the only deletions are performed by
//! the retention sweep, which removes DELETE and CLEANUP entries past the
//! retention window. CREATE entries are the permanent record.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "audit_action")]
pub enum AuditAction {
    #[sea_orm(string_value = "CREATE")]
    Create,
    #[sea_orm(string_value = "DELETE")]
    Delete,
    #[sea_orm(string_value = "CLEANUP")]
    Cleanup,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Cleanup => "CLEANUP",
        }
    }

    pub fn from_filter(value: &str) -> Option<Self> {
        match value {
            "CREATE" => Some(Self::Create),
            "DELETE" => Some(Self::Delete),
            "CLEANUP" => Some(Self::Cleanup),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub action_type: AuditAction,
    pub table_name: String,
    pub record_id: i32,
    pub user_name: String,
    pub details: Option<Json>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
