//! SeaORM Entity for the infraction_deletions table
//!
//! Immutable record written whenever an infraction is actually removed,
//! whether by an admin directly or through an approved request. Doubles as
//! the source of truth for the daily deletion quota: completed deletions are
//! counted by deleted_by_id and date.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "infraction_deletions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub infraction_id: i32,
    /// Display name of the identity the deletion is attributed to. For an
    /// approved request this is the requester, not the approving admin.
    pub deleted_by: String,
    pub deleted_by_id: i32,
    #[sea_orm(column_type = "Text")]
    pub deletion_reason: String,
    pub original_data: Json,
    pub deleted_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
