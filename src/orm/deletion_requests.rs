//! SeaORM Entity for the deletion_requests table
//!
//! A member's request to remove an infraction, carrying a full snapshot of
//! the row as it looked at request time. Admins approve (which performs the
//! actual removal) or deny (which archives the request and nothing else).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "request_status")]
pub enum RequestStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "denied")]
    Denied,
    /// Legacy terminal status from before approved/denied were split out.
    /// Read-only; nothing writes it anymore.
    #[sea_orm(string_value = "processed")]
    Processed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Processed => "processed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "deletion_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Plain column on purpose: the infraction row is removed on approval
    /// while the request row lives on as history.
    pub infraction_id: i32,
    pub requested_by_user_id: i32,
    pub requested_by_name: String,
    #[sea_orm(column_type = "Text")]
    pub deletion_reason: String,
    /// Snapshot of the infraction at request time.
    pub original_data: Json,
    pub status: RequestStatus,
    pub processed_by_user_id: Option<i32>,
    pub processed_by_name: Option<String>,
    pub processed_at: Option<DateTime>,
    pub created_at: DateTime,
    /// Pending requests past this point are presumed abandoned and are
    /// reclaimed by the expiry sweep.
    pub expires_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
