//! Retention sweeps.
//!
//! Deletion history is deliberately short-lived: snapshot rows and their
//! DELETE/CLEANUP audit entries are kept for a configured number of hours
//! and then swept. CREATE audit entries are the permanent record and are
//! never touched. Expired pending deletion requests are reclaimed by a
//! separate sweep. Both sweeps are idempotent.

use crate::audit;
use crate::config::Config;
use crate::orm::audit_logs::{self, AuditAction};
use crate::orm::deletion_requests::{self, RequestStatus};
use crate::orm::infraction_deletions;
use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{
    entity::*, query::*, DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement,
};

/// Outcome of an old-records sweep.
#[derive(Clone, Debug)]
pub struct CleanupReport {
    pub deleted_infractions: u64,
    pub deleted_audit_logs: u64,
    pub cleanup_timestamp: NaiveDateTime,
}

/// Drop pending deletion requests whose expiry has passed. The expiry
/// deadline was stamped onto each request when it was filed, so this sweep
/// needs no configuration.
pub async fn cleanup_expired_requests(
    db: &DatabaseConnection,
    actor_name: &str,
) -> Result<u64, DbErr> {
    let now = Utc::now().naive_utc();

    let result = deletion_requests::Entity::delete_many()
        .filter(deletion_requests::Column::Status.eq(RequestStatus::Pending))
        .filter(deletion_requests::Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        log::info!(
            "Expired {} pending deletion requests",
            result.rows_affected
        );
        audit::record(
            db,
            AuditAction::Cleanup,
            "deletion_requests",
            0,
            actor_name,
            Some(serde_json::json!({
                "expired_requests": result.rows_affected,
            })),
        )
        .await;
    }

    Ok(result.rows_affected)
}

/// Drop deletion history older than the retention window: snapshot rows in
/// infraction_deletions, and audit rows of type DELETE or CLEANUP.
pub async fn cleanup_old_records(
    db: &DatabaseConnection,
    config: &Config,
    actor_name: &str,
) -> Result<CleanupReport, DbErr> {
    let now = Utc::now().naive_utc();
    let cutoff = now - Duration::hours(config.deletion_retention_hours());

    let deletions = infraction_deletions::Entity::delete_many()
        .filter(infraction_deletions::Column::DeletedAt.lt(cutoff))
        .exec(db)
        .await?;

    let audits = audit_logs::Entity::delete_many()
        .filter(audit_logs::Column::CreatedAt.lt(cutoff))
        .filter(audit_logs::Column::ActionType.is_in([AuditAction::Delete, AuditAction::Cleanup]))
        .exec(db)
        .await?;

    let report = CleanupReport {
        deleted_infractions: deletions.rows_affected,
        deleted_audit_logs: audits.rows_affected,
        cleanup_timestamp: now,
    };

    if report.deleted_infractions > 0 || report.deleted_audit_logs > 0 {
        log::info!(
            "Retention sweep removed {} deletion records and {} audit entries",
            report.deleted_infractions,
            report.deleted_audit_logs
        );
        audit::record(
            db,
            AuditAction::Cleanup,
            "infraction_deletions",
            0,
            actor_name,
            Some(serde_json::json!({
                "deleted_infractions": report.deleted_infractions,
                "deleted_audit_logs": report.deleted_audit_logs,
            })),
        )
        .await;
    }

    Ok(report)
}

/// Numbers for the cleanup panel.
#[derive(Clone, Debug, FromQueryResult)]
pub struct CleanupStats {
    pub total_deletion_records: i64,
    /// Rows already past the cutoff; the next sweep removes them.
    pub records_pending_cleanup: i64,
    /// Rows that will pass the cutoff within one sweep interval.
    pub next_cleanup_candidates: i64,
    pub oldest_deletion_record: Option<NaiveDateTime>,
}

pub async fn cleanup_stats(
    db: &DatabaseConnection,
    config: &Config,
) -> Result<CleanupStats, DbErr> {
    let now = Utc::now().naive_utc();
    let cutoff = now - Duration::hours(config.deletion_retention_hours());
    let horizon = cutoff + Duration::seconds(config.cleanup_interval_secs());

    let sql = r#"
        SELECT
            COUNT(*) AS total_deletion_records,
            COUNT(*) FILTER (WHERE deleted_at < $1) AS records_pending_cleanup,
            COUNT(*) FILTER (WHERE deleted_at >= $1 AND deleted_at < $2) AS next_cleanup_candidates,
            MIN(deleted_at) AS oldest_deletion_record
        FROM infraction_deletions
    "#;

    let row = CleanupStats::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![cutoff.into(), horizon.into()],
    ))
    .one(db)
    .await?;

    row.ok_or_else(|| DbErr::Custom("cleanup stats query returned no row".to_string()))
}

/// Run both sweeps with system attribution. Called from the background
/// interval task; failures are logged there and the task keeps running.
pub async fn run_scheduled(db: &DatabaseConnection, config: &Config) -> Result<(), DbErr> {
    cleanup_expired_requests(db, crate::constants::SYSTEM_USERNAME).await?;
    cleanup_old_records(db, config, crate::constants::SYSTEM_USERNAME).await?;
    Ok(())
}
