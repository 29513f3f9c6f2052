//! Role resolution with in-memory caching.
//!
//! Access control is a three-state closed set: a user is an admin, a member,
//! or holds no role at all (authenticated but unapproved). The role row is
//! looked up per request, so resolutions go through a short-lived moka cache
//! that is explicitly invalidated whenever an admin changes someone's role.
//!
//! Failure policy is fail-closed: if the lookup errors, the user is treated
//! as unapproved. A resolution error must never widen access.

use crate::orm::user_roles::{self, UserRole};
use chrono::Utc;
use moka::sync::Cache;
use once_cell::sync::Lazy;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use std::time::Duration;

/// Effective role of an authenticated user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Authenticated but unapproved. Sees only the pending-approval screen.
    None,
    Member,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Member-level access: members and admins both clear this bar.
    pub fn is_approved(&self) -> bool {
        !matches!(self, Role::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::None => "none",
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl From<Option<UserRole>> for Role {
    fn from(value: Option<UserRole>) -> Self {
        match value {
            Some(UserRole::Admin) => Role::Admin,
            Some(UserRole::Member) => Role::Member,
            None => Role::None,
        }
    }
}

/// Cache of resolved roles with a short TTL.
/// Key is user_id. Mutations must call `invalidate` so approvals and
/// demotions are visible on the next request, not a TTL later.
static ROLE_CACHE: Lazy<Cache<i32, Role>> = Lazy::new(|| {
    Cache::builder()
        .time_to_live(Duration::from_secs(30))
        .max_capacity(10_000)
        .build()
});

/// Resolve a user's role straight from the database, bypassing the cache.
/// Enforcement points that cannot tolerate staleness use this.
pub async fn resolve_role(db: &DatabaseConnection, user_id: i32) -> Result<Role, DbErr> {
    let row = user_roles::Entity::find()
        .filter(user_roles::Column::UserId.eq(user_id))
        .one(db)
        .await?;

    Ok(Role::from(row.map(|r| r.role)))
}

/// Resolve a user's role, using the cache if possible.
/// Lookup errors degrade to `Role::None` and are not cached, so a transient
/// database problem does not pin a user out for a full TTL.
pub async fn get_role(db: &DatabaseConnection, user_id: i32) -> Role {
    if let Some(cached) = ROLE_CACHE.get(&user_id) {
        return cached;
    }

    match resolve_role(db, user_id).await {
        Ok(role) => {
            ROLE_CACHE.insert(user_id, role);
            role
        }
        Err(e) => {
            log::warn!("role lookup failed for user {}: {}", user_id, e);
            Role::None
        }
    }
}

/// Drop a user's cached role. Call after any role mutation.
pub fn invalidate(user_id: i32) {
    ROLE_CACHE.invalidate(&user_id);
}

/// Force a fresh resolution and repopulate the cache. The landing redirect
/// uses this so an approval shows up on the next page load, not a TTL later.
pub async fn refresh(db: &DatabaseConnection, user_id: i32) -> Role {
    invalidate(user_id);
    get_role(db, user_id).await
}

/// Insert or overwrite the single role row for a user.
///
/// Generic over the connection so approval flows can keep the role write
/// inside their transaction. Callers invalidate the cache once that
/// transaction commits.
pub async fn assign_role<C>(
    db: &C,
    user_id: i32,
    role: UserRole,
    created_by: Option<i32>,
) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let existing = user_roles::Entity::find()
        .filter(user_roles::Column::UserId.eq(user_id))
        .one(db)
        .await?;

    match existing {
        Some(row) if row.role == role => {}
        Some(row) => {
            let mut row: user_roles::ActiveModel = row.into();
            row.role = Set(role);
            row.update(db).await?;
        }
        None => {
            user_roles::ActiveModel {
                user_id: Set(user_id),
                role: Set(role),
                created_by: Set(created_by),
                created_at: Set(Utc::now().naive_utc()),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    Ok(())
}

/// Number of users currently holding the admin role. The last-admin guards
/// embed their own count in SQL; this read is for everything else.
pub async fn admin_count(db: &DatabaseConnection) -> Result<u64, DbErr> {
    user_roles::Entity::find()
        .filter(user_roles::Column::Role.eq(UserRole::Admin))
        .count(db)
        .await
        .map(|n| n as u64)
}
