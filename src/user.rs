//! User profiles and account administration.
//!
//! Role changes and account removal are admin actions with a hard floor:
//! the system must never lose its last administrator. Both guards run as
//! single SQL statements with a subquery condition, so they hold under
//! concurrent admins without advisory locking.

use crate::audit;
use crate::orm::audit_logs::AuditAction;
use crate::orm::{access_requests, sessions, user_roles, users};
use crate::role::Role;
use sea_orm::sea_query::Expr;
use sea_orm::{
    entity::*, query::*, ConnectionTrait, DatabaseConnection, DbBackend, DbErr, FromQueryResult,
    Statement, TransactionTrait,
};

/// A struct to hold display information for a user.
#[derive(Clone, Debug, FromQueryResult)]
pub struct Profile {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub created_at: chrono::NaiveDateTime,
}

impl Profile {
    /// Returns a user profile by id.
    pub async fn get_by_id(
        db: &DatabaseConnection,
        id: i32,
    ) -> Result<Option<Self>, sea_orm::DbErr> {
        users::Entity::find_by_id(id)
            .into_model::<Self>()
            .one(db)
            .await
    }
}

/// An authenticated user acting on a record. Handlers build this from the
/// request context and pass it down so attribution is always explicit.
#[derive(Clone, Debug)]
pub struct Actor {
    pub id: i32,
    pub name: String,
    pub role: Role,
}

/// Account administration errors.
#[derive(Debug)]
pub enum UserAdminError {
    NoRole,
    NotAdmin,
    LastAdmin,
    SelfDeletion,
    NotFound,
    Db(DbErr),
}

impl std::fmt::Display for UserAdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserAdminError::NoRole => write!(f, "Account has no role"),
            UserAdminError::NotAdmin => write!(f, "Account is not an administrator"),
            UserAdminError::LastAdmin => write!(f, "At least one administrator must remain"),
            UserAdminError::SelfDeletion => write!(f, "Cannot remove own account"),
            UserAdminError::NotFound => write!(f, "User not found"),
            UserAdminError::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for UserAdminError {}

impl From<DbErr> for UserAdminError {
    fn from(e: DbErr) -> Self {
        UserAdminError::Db(e)
    }
}

/// Promote a member to admin. Accounts without a role must go through the
/// access approval flow first.
pub async fn promote_to_admin(
    db: &DatabaseConnection,
    target_user_id: i32,
) -> Result<(), UserAdminError> {
    let updated = user_roles::Entity::update_many()
        .col_expr(
            user_roles::Column::Role,
            Expr::value(user_roles::UserRole::Admin),
        )
        .filter(user_roles::Column::UserId.eq(target_user_id))
        .filter(user_roles::Column::Role.eq(user_roles::UserRole::Member))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        return Err(UserAdminError::NoRole);
    }

    crate::role::invalidate(target_user_id);
    Ok(())
}

/// Demote an admin back to member. The statement carries its own guard so
/// the last admin can never be demoted, no matter how requests interleave.
pub async fn demote_to_member(
    db: &DatabaseConnection,
    target_user_id: i32,
) -> Result<(), UserAdminError> {
    let target = user_roles::Entity::find()
        .filter(user_roles::Column::UserId.eq(target_user_id))
        .one(db)
        .await?;

    match target {
        Some(row) if row.role == user_roles::UserRole::Admin => {}
        Some(_) => return Err(UserAdminError::NotAdmin),
        None => return Err(UserAdminError::NoRole),
    }

    let result = db
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE user_roles SET role = 'member'
            WHERE user_id = $1 AND role = 'admin'
              AND (SELECT COUNT(*) FROM user_roles WHERE role = 'admin') > 1
            "#,
            vec![target_user_id.into()],
        ))
        .await?;

    if result.rows_affected() == 0 {
        return Err(UserAdminError::LastAdmin);
    }

    crate::role::invalidate(target_user_id);
    Ok(())
}

/// Remove an account. History tables keep the display name, so past
/// infractions, deletions, and audit entries survive the removal.
///
/// Returns the removed user's row for the caller's records.
pub async fn delete_account(
    db: &DatabaseConnection,
    admin: &Actor,
    target_user_id: i32,
) -> Result<users::Model, UserAdminError> {
    if target_user_id == admin.id {
        return Err(UserAdminError::SelfDeletion);
    }

    let txn = db.begin().await?;

    let user = users::Entity::find_by_id(target_user_id)
        .one(&txn)
        .await?
        .ok_or(UserAdminError::NotFound)?;

    let role_row = user_roles::Entity::find()
        .filter(user_roles::Column::UserId.eq(target_user_id))
        .one(&txn)
        .await?;

    // The role row goes first. For admins the delete carries the
    // last-admin guard; zero rows means the guard fired and dropping
    // the transaction leaves everything in place.
    if matches!(&role_row, Some(row) if row.role == user_roles::UserRole::Admin) {
        let guard = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                DELETE FROM user_roles
                WHERE user_id = $1
                  AND (SELECT COUNT(*) FROM user_roles WHERE role = 'admin') > 1
                "#,
                vec![target_user_id.into()],
            ))
            .await?;

        if guard.rows_affected() == 0 {
            return Err(UserAdminError::LastAdmin);
        }
    } else if role_row.is_some() {
        user_roles::Entity::delete_many()
            .filter(user_roles::Column::UserId.eq(target_user_id))
            .exec(&txn)
            .await?;
    }

    // Then everything that hangs off the account, then the account
    // itself. The order matches the foreign keys so no orphan survives
    // a partial failure.
    sessions::Entity::delete_many()
        .filter(sessions::Column::UserId.eq(target_user_id))
        .exec(&txn)
        .await?;

    access_requests::Entity::delete_many()
        .filter(access_requests::Column::UserId.eq(target_user_id))
        .exec(&txn)
        .await?;

    users::Entity::delete_by_id(target_user_id)
        .exec(&txn)
        .await?;

    txn.commit().await?;

    audit::record(
        db,
        AuditAction::Delete,
        "users",
        target_user_id,
        &admin.name,
        Some(serde_json::json!({
            "name": user.name,
            "email": user.email,
            "role": role_row.map(|r| r.role.as_str().to_owned()),
        })),
    )
    .await;

    if let Err(e) =
        crate::session::invalidate_user_sessions(crate::session::get_sess(), target_user_id).await
    {
        log::error!(
            "Failed to invalidate sessions of user {}: {}",
            target_user_id,
            e
        );
    }
    crate::role::invalidate(target_user_id);

    log::info!(
        "Account {} (user_id={}) removed by {}",
        user.name,
        target_user_id,
        admin.name
    );

    Ok(user)
}
