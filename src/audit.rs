//! Append-only audit trail.
//!
//! Every CREATE, DELETE and CLEANUP action lands here with the acting user's
//! name and a JSON detail blob. Rows are never updated. Recording is best
//! effort and happens after the primary action commits: a failed audit
//! insert is logged and the action stands.

use crate::orm::audit_logs::{self, AuditAction};
use chrono::Utc;
use sea_orm::{entity::*, DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement};
use serde_json::Value;

/// Insert one audit row.
pub async fn append(
    db: &DatabaseConnection,
    action: AuditAction,
    table_name: &str,
    record_id: i32,
    user_name: &str,
    details: Option<Value>,
) -> Result<(), DbErr> {
    let entry = audit_logs::ActiveModel {
        action_type: Set(action),
        table_name: Set(table_name.to_string()),
        record_id: Set(record_id),
        user_name: Set(user_name.to_string()),
        details: Set(details),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    audit_logs::Entity::insert(entry).exec(db).await?;

    Ok(())
}

/// Insert one audit row, swallowing failures.
///
/// The trail must never block the action it describes, so callers that have
/// already committed use this instead of propagating the error.
pub async fn record(
    db: &DatabaseConnection,
    action: AuditAction,
    table_name: &str,
    record_id: i32,
    user_name: &str,
    details: Option<Value>,
) {
    if let Err(e) = append(db, action, table_name, record_id, user_name, details).await {
        log::error!(
            "Failed to record audit entry ({} on {} #{}): {}",
            action.as_str(),
            table_name,
            record_id,
            e
        );
    }
}

/// Search the trail, newest first.
///
/// Both filters are optional. The free-text term matches the acting user,
/// the table name, the record id, or anywhere in the detail blob.
pub async fn search(
    db: &DatabaseConnection,
    action: Option<AuditAction>,
    term: Option<&str>,
    limit: u64,
) -> Result<Vec<audit_logs::Model>, DbErr> {
    let sql = r#"
        SELECT * FROM audit_logs
        WHERE ($1::varchar IS NULL OR CAST(action_type AS varchar) = $1)
          AND (
            $2::varchar IS NULL
            OR user_name ILIKE '%' || $2 || '%'
            OR table_name ILIKE '%' || $2 || '%'
            OR CAST(record_id AS varchar) = $2
            OR details::text ILIKE '%' || $2 || '%'
          )
        ORDER BY created_at DESC, id DESC
        LIMIT $3
    "#;

    let action_param: Option<String> = action.map(|a| a.as_str().to_string());
    let term_param: Option<String> = term
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    audit_logs::Model::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![action_param.into(), term_param.into(), (limit as i64).into()],
    ))
    .all(db)
    .await
}
