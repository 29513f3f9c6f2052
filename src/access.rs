//! Access request workflow.
//!
//! A new account starts without a role and with one pending access request.
//! Admins approve (granting the member role) or deny; a denied user may file
//! a fresh request. Only one pending request per user may exist at a time.
//!
//! The status transition is a conditional update inside a transaction, so a
//! request is processed exactly once even under concurrent admins.

use crate::orm::access_requests::{self, AccessStatus};
use crate::orm::user_roles::UserRole;
use crate::user::Actor;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr, TransactionTrait};

/// Access request workflow errors.
#[derive(Debug)]
pub enum AccessError {
    AlreadyApproved,
    AlreadyPending,
    NotPending,
    Db(DbErr),
}

impl std::fmt::Display for AccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessError::AlreadyApproved => write!(f, "Account already has access"),
            AccessError::AlreadyPending => write!(f, "A request is already awaiting review"),
            AccessError::NotPending => write!(f, "Request is not pending"),
            AccessError::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for AccessError {}

impl From<DbErr> for AccessError {
    fn from(e: DbErr) -> Self {
        AccessError::Db(e)
    }
}

/// File a fresh access request for a user without a role.
///
/// Used for re-applications after a denial; the initial request is created
/// together with the account at registration.
pub async fn file_request(
    db: &DatabaseConnection,
    user_id: i32,
    name: &str,
    email: &str,
    reason: Option<String>,
) -> Result<access_requests::Model, AccessError> {
    if crate::role::resolve_role(db, user_id).await?.is_approved() {
        return Err(AccessError::AlreadyApproved);
    }

    let pending = access_requests::Entity::find()
        .filter(access_requests::Column::UserId.eq(user_id))
        .filter(access_requests::Column::Status.eq(AccessStatus::Pending))
        .one(db)
        .await?;
    if pending.is_some() {
        return Err(AccessError::AlreadyPending);
    }

    let request = access_requests::ActiveModel {
        user_id: Set(user_id),
        email: Set(email.to_owned()),
        name: Set(name.to_owned()),
        reason: Set(reason),
        status: Set(AccessStatus::Pending),
        requested_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("Access request #{} filed by user_id={}", request.id, user_id);

    Ok(request)
}

/// Approve a pending request and grant the member role, in one transaction.
pub async fn approve(
    db: &DatabaseConnection,
    admin: &Actor,
    request_id: i32,
) -> Result<access_requests::Model, AccessError> {
    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    // Conditional transition. Zero rows means someone else already
    // processed this request.
    let updated = access_requests::Entity::update_many()
        .col_expr(
            access_requests::Column::Status,
            Expr::value(AccessStatus::Approved),
        )
        .col_expr(access_requests::Column::ProcessedAt, Expr::value(Some(now)))
        .col_expr(
            access_requests::Column::ProcessedByName,
            Expr::value(Some(admin.name.clone())),
        )
        .filter(access_requests::Column::Id.eq(request_id))
        .filter(access_requests::Column::Status.eq(AccessStatus::Pending))
        .exec(&txn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(AccessError::NotPending);
    }

    let request = access_requests::Entity::find_by_id(request_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AccessError::Db(DbErr::Custom("request row vanished".to_string())))?;

    // The role write rides the same transaction. An approved request
    // must never leave the user roleless.
    crate::role::assign_role(&txn, request.user_id, UserRole::Member, Some(admin.id)).await?;

    txn.commit().await?;

    crate::role::invalidate(request.user_id);
    log::info!(
        "Access request #{} approved by {}: user_id={} is now a member",
        request_id,
        admin.name,
        request.user_id
    );

    Ok(request)
}

/// Deny a pending request. The user keeps their account and may re-apply.
pub async fn deny(
    db: &DatabaseConnection,
    admin: &Actor,
    request_id: i32,
) -> Result<(), AccessError> {
    let updated = access_requests::Entity::update_many()
        .col_expr(
            access_requests::Column::Status,
            Expr::value(AccessStatus::Denied),
        )
        .col_expr(
            access_requests::Column::ProcessedAt,
            Expr::value(Some(Utc::now().naive_utc())),
        )
        .col_expr(
            access_requests::Column::ProcessedByName,
            Expr::value(Some(admin.name.clone())),
        )
        .filter(access_requests::Column::Id.eq(request_id))
        .filter(access_requests::Column::Status.eq(AccessStatus::Pending))
        .exec(db)
        .await?;
    if updated.rows_affected == 0 {
        return Err(AccessError::NotPending);
    }

    log::info!("Access request #{} denied by {}", request_id, admin.name);

    Ok(())
}

/// A user's most recent request, for the waiting-room screen.
pub async fn latest_for_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Option<access_requests::Model>, DbErr> {
    access_requests::Entity::find()
        .filter(access_requests::Column::UserId.eq(user_id))
        .order_by_desc(access_requests::Column::RequestedAt)
        .order_by_desc(access_requests::Column::Id)
        .one(db)
        .await
}

/// Queue listing for admins, newest first.
pub async fn list(
    db: &DatabaseConnection,
    status: Option<AccessStatus>,
) -> Result<Vec<access_requests::Model>, DbErr> {
    let mut select = access_requests::Entity::find();

    if let Some(status) = status {
        select = select.filter(access_requests::Column::Status.eq(status));
    }

    select
        .order_by_desc(access_requests::Column::RequestedAt)
        .limit(crate::app_config::limits().max_list_rows)
        .all(db)
        .await
}
