//! SeaORM Entity for the users table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Password hashing scheme recorded next to the hash so old hashes can be
/// re-encrypted if the scheme ever changes.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "password_cipher")]
pub enum Cipher {
    #[sea_orm(string_value = "argon2id")]
    Argon2id,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Display name, also shown in audit trails. Unique.
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password: String,
    pub password_cipher: Cipher,
    pub created_at: DateTime,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
