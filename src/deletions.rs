//! Infraction deletion workflow.
//!
//! Removal of an infraction is role-gated. Admins delete immediately; members
//! file a request an admin must approve. Either way the row only disappears
//! together with a snapshot row in infraction_deletions, which doubles as the
//! quota ledger: members get a fixed number of completed deletions per
//! calendar day, counted against the identity the deletion is attributed to.
//!
//! Every invariant here is enforced in SQL, inside a transaction: the status
//! transition is a conditional update (so a request is approved or denied
//! exactly once) and the row delete is guarded by rows_affected (so of two
//! concurrent attempts the first writer wins and the loser rolls back).

use crate::audit;
use crate::config::Config;
use crate::orm::audit_logs::AuditAction;
use crate::orm::deletion_requests::{self, RequestStatus};
use crate::orm::infraction_deletions;
use crate::orm::infractions;
use crate::user::Actor;
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    entity::*, query::*, DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement,
    TransactionTrait,
};

/// Deletion workflow errors.
#[derive(Debug)]
pub enum DeletionError {
    /// Actor has no role that allows deletion
    Unauthorized,
    /// Actor used up today's completed deletions
    QuotaExceeded { limit: i64 },
    /// Target infraction already deleted
    InfractionGone,
    /// Request already approved, denied, or expired
    RequestNotPending,
    /// Database error
    Db(DbErr),
}

impl std::fmt::Display for DeletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletionError::Unauthorized => {
                write!(f, "You do not have permission to delete records")
            }
            DeletionError::QuotaExceeded { limit } => {
                write!(f, "Daily deletion limit of {} reached", limit)
            }
            DeletionError::InfractionGone => write!(f, "Infraction record no longer exists"),
            DeletionError::RequestNotPending => write!(f, "Request is not pending"),
            DeletionError::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for DeletionError {}

impl From<DbErr> for DeletionError {
    fn from(e: DbErr) -> Self {
        DeletionError::Db(e)
    }
}

/// What request_deletion did, by role.
#[derive(Debug)]
pub enum DeletionOutcome {
    /// Admin path: the infraction is gone.
    Deleted,
    /// Member path: a pending request was filed, the infraction is untouched.
    Requested(deletion_requests::Model),
}

#[derive(FromQueryResult)]
struct CountRow {
    count: i64,
}

/// Completed deletions attributed to a user today (server-local calendar
/// date). One query; pending requests do not count.
pub async fn daily_deletion_count(db: &DatabaseConnection, user_id: i32) -> Result<i64, DbErr> {
    let sql = r#"
        SELECT COUNT(*) AS count
        FROM infraction_deletions
        WHERE deleted_by_id = $1 AND deleted_at >= CURRENT_DATE
    "#;

    let row = CountRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![user_id.into()],
    ))
    .one(db)
    .await?;

    Ok(row.map(|r| r.count).unwrap_or(0))
}

fn snapshot(infraction: &infractions::Model) -> Result<serde_json::Value, DeletionError> {
    serde_json::to_value(infraction)
        .map_err(|e| DeletionError::Db(DbErr::Custom(format!("failed to snapshot record: {}", e))))
}

/// Entry point for deleting an infraction. Dispatches on the actor's role.
pub async fn request_deletion(
    db: &DatabaseConnection,
    config: &Config,
    actor: &Actor,
    infraction_id: i32,
    reason: &str,
) -> Result<DeletionOutcome, DeletionError> {
    if !actor.role.is_approved() {
        return Err(DeletionError::Unauthorized);
    }

    if actor.role.is_admin() {
        delete_as_admin(db, actor, infraction_id, reason).await
    } else {
        file_request(db, config, actor, infraction_id, reason).await
    }
}

/// Admin path: snapshot, log, delete, all in one transaction. No quota.
async fn delete_as_admin(
    db: &DatabaseConnection,
    actor: &Actor,
    infraction_id: i32,
    reason: &str,
) -> Result<DeletionOutcome, DeletionError> {
    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    let infraction = infractions::Entity::find_by_id(infraction_id)
        .one(&txn)
        .await?
        .ok_or(DeletionError::InfractionGone)?;

    infraction_deletions::ActiveModel {
        infraction_id: Set(infraction.id),
        deleted_by: Set(actor.name.clone()),
        deleted_by_id: Set(actor.id),
        deletion_reason: Set(reason.to_string()),
        original_data: Set(snapshot(&infraction)?),
        deleted_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let deleted = infractions::Entity::delete_by_id(infraction.id)
        .exec(&txn)
        .await?;
    if deleted.rows_affected == 0 {
        // Lost the race to a concurrent deletion. Dropping the transaction
        // rolls back our snapshot row.
        return Err(DeletionError::InfractionGone);
    }

    txn.commit().await?;

    log::info!(
        "Infraction #{} deleted by admin {}",
        infraction.id,
        actor.name
    );

    audit::record(
        db,
        AuditAction::Delete,
        "infractions",
        infraction.id,
        &actor.name,
        Some(serde_json::json!({
            "reason": reason,
            "officer_name": infraction.officer_name,
        })),
    )
    .await;

    Ok(DeletionOutcome::Deleted)
}

/// Member path: quota check, then a pending request. The infraction stays.
async fn file_request(
    db: &DatabaseConnection,
    config: &Config,
    actor: &Actor,
    infraction_id: i32,
    reason: &str,
) -> Result<DeletionOutcome, DeletionError> {
    let limit = config.daily_deletion_limit();
    let used = daily_deletion_count(db, actor.id).await?;
    if used >= limit {
        return Err(DeletionError::QuotaExceeded { limit });
    }

    let infraction = infractions::Entity::find_by_id(infraction_id)
        .one(db)
        .await?
        .ok_or(DeletionError::InfractionGone)?;

    let now = Utc::now().naive_utc();
    let expires_at = now + Duration::hours(config.deletion_request_ttl_hours());

    let request = deletion_requests::ActiveModel {
        infraction_id: Set(infraction.id),
        requested_by_user_id: Set(actor.id),
        requested_by_name: Set(actor.name.clone()),
        deletion_reason: Set(reason.to_string()),
        original_data: Set(snapshot(&infraction)?),
        status: Set(RequestStatus::Pending),
        created_at: Set(now),
        expires_at: Set(expires_at),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!(
        "Deletion request #{} filed by {} for infraction #{}",
        request.id,
        actor.name,
        infraction.id
    );

    Ok(DeletionOutcome::Requested(request))
}

/// Approve a pending request: flip its status, then carry out the deletion
/// attributed to the requester. One transaction, first writer wins.
///
/// If the infraction vanished underneath the request, the whole transaction
/// rolls back and the request stays pending for the admin to deny.
pub async fn approve_request(
    db: &DatabaseConnection,
    admin: &Actor,
    request_id: i32,
) -> Result<deletion_requests::Model, DeletionError> {
    let txn = db.begin().await?;
    let now = Utc::now().naive_utc();

    let transition = deletion_requests::Entity::update_many()
        .col_expr(
            deletion_requests::Column::Status,
            Expr::value(RequestStatus::Approved),
        )
        .col_expr(
            deletion_requests::Column::ProcessedByUserId,
            Expr::value(Some(admin.id)),
        )
        .col_expr(
            deletion_requests::Column::ProcessedByName,
            Expr::value(Some(admin.name.clone())),
        )
        .col_expr(
            deletion_requests::Column::ProcessedAt,
            Expr::value(Some(now)),
        )
        .filter(deletion_requests::Column::Id.eq(request_id))
        .filter(deletion_requests::Column::Status.eq(RequestStatus::Pending))
        .exec(&txn)
        .await?;
    if transition.rows_affected == 0 {
        return Err(DeletionError::RequestNotPending);
    }

    let request = deletion_requests::Entity::find_by_id(request_id)
        .one(&txn)
        .await?
        .ok_or_else(|| DeletionError::Db(DbErr::Custom("request row vanished".to_string())))?;

    let infraction = infractions::Entity::find_by_id(request.infraction_id)
        .one(&txn)
        .await?
        .ok_or(DeletionError::InfractionGone)?;

    // The deletion is attributed to the requester, not the approving admin:
    // their name on the record, their quota it counts against.
    infraction_deletions::ActiveModel {
        infraction_id: Set(infraction.id),
        deleted_by: Set(request.requested_by_name.clone()),
        deleted_by_id: Set(request.requested_by_user_id),
        deletion_reason: Set(request.deletion_reason.clone()),
        original_data: Set(request.original_data.clone()),
        deleted_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let deleted = infractions::Entity::delete_by_id(infraction.id)
        .exec(&txn)
        .await?;
    if deleted.rows_affected == 0 {
        return Err(DeletionError::InfractionGone);
    }

    txn.commit().await?;

    log::info!(
        "Deletion request #{} approved by {} (requested by {})",
        request.id,
        admin.name,
        request.requested_by_name
    );

    audit::record(
        db,
        AuditAction::Delete,
        "infractions",
        infraction.id,
        &request.requested_by_name,
        Some(serde_json::json!({
            "reason": request.deletion_reason,
            "officer_name": infraction.officer_name,
        })),
    )
    .await;

    Ok(request)
}

/// Deny a pending request. The infraction is untouched, so this is a single
/// conditional update with no audit DELETE entry.
pub async fn deny_request(
    db: &DatabaseConnection,
    admin: &Actor,
    request_id: i32,
) -> Result<(), DeletionError> {
    let now = Utc::now().naive_utc();

    let transition = deletion_requests::Entity::update_many()
        .col_expr(
            deletion_requests::Column::Status,
            Expr::value(RequestStatus::Denied),
        )
        .col_expr(
            deletion_requests::Column::ProcessedByUserId,
            Expr::value(Some(admin.id)),
        )
        .col_expr(
            deletion_requests::Column::ProcessedByName,
            Expr::value(Some(admin.name.clone())),
        )
        .col_expr(
            deletion_requests::Column::ProcessedAt,
            Expr::value(Some(now)),
        )
        .filter(deletion_requests::Column::Id.eq(request_id))
        .filter(deletion_requests::Column::Status.eq(RequestStatus::Pending))
        .exec(db)
        .await?;
    if transition.rows_affected == 0 {
        return Err(DeletionError::RequestNotPending);
    }

    log::info!("Deletion request #{} denied by {}", request_id, admin.name);

    Ok(())
}

/// Requests visible to a viewer: admins see everything, members their own.
pub async fn list_requests(
    db: &DatabaseConnection,
    viewer: &Actor,
    status: Option<RequestStatus>,
) -> Result<Vec<deletion_requests::Model>, DbErr> {
    let mut select = deletion_requests::Entity::find();

    if !viewer.role.is_admin() {
        select = select.filter(deletion_requests::Column::RequestedByUserId.eq(viewer.id));
    }

    if let Some(status) = status {
        select = select.filter(deletion_requests::Column::Status.eq(status));
    }

    select
        .order_by_desc(deletion_requests::Column::CreatedAt)
        .limit(crate::app_config::limits().max_list_rows)
        .all(db)
        .await
}
