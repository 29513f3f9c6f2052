/// Administration tools
///
/// Everything under /admin requires the admin role. Overview numbers,
/// user and role management, the audit trail, retention cleanup, and
/// runtime settings all live here.
use crate::audit;
use crate::cleanup::{self, CleanupStats};
use crate::config::{Config, SettingValue};
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::orm::audit_logs::AuditAction;
use crate::orm::{
    access_requests, audit_logs, deletion_requests, infractions, setting_history, settings, users,
};
use crate::user::{self, UserAdminError};
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama::Template;
use askama_actix::TemplateToResponse;
use sea_orm::{entity::*, query::*, DbBackend, FromQueryResult, QueryFilter, Statement};
use serde::Deserialize;
use std::sync::Arc;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_admin)
        .service(view_users)
        .service(update_user_role)
        .service(delete_user)
        .service(view_audit_log)
        .service(view_cleanup)
        .service(cleanup_old_records)
        .service(cleanup_expired_requests)
        .service(view_settings)
        .service(update_setting);
}

// =============================================================================
// Overview
// =============================================================================

#[derive(Template)]
#[template(path = "admin/overview.html")]
struct AdminTemplate {
    client: ClientCtx,
    total_users: i64,
    pending_access_requests: i64,
    pending_deletion_requests: i64,
    total_infractions: i64,
}

#[get("/admin")]
async fn view_admin(client: ClientCtx) -> Result<impl Responder, Error> {
    client.require_admin()?;
    let db = get_db_pool();

    let total_users = users::Entity::find().count(db).await.map_err(|e| {
        log::error!("Failed to count users: {}", e);
        error::ErrorInternalServerError("Database error")
    })? as i64;

    let pending_access_requests = access_requests::Entity::find()
        .filter(
            access_requests::Column::Status.eq(crate::orm::access_requests::AccessStatus::Pending),
        )
        .count(db)
        .await
        .map_err(|e| {
            log::error!("Failed to count access requests: {}", e);
            error::ErrorInternalServerError("Database error")
        })? as i64;

    let pending_deletion_requests = deletion_requests::Entity::find()
        .filter(
            deletion_requests::Column::Status
                .eq(crate::orm::deletion_requests::RequestStatus::Pending),
        )
        .count(db)
        .await
        .map_err(|e| {
            log::error!("Failed to count deletion requests: {}", e);
            error::ErrorInternalServerError("Database error")
        })? as i64;

    let total_infractions = infractions::Entity::find().count(db).await.map_err(|e| {
        log::error!("Failed to count infractions: {}", e);
        error::ErrorInternalServerError("Database error")
    })? as i64;

    Ok(AdminTemplate {
        client,
        total_users,
        pending_access_requests,
        pending_deletion_requests,
        total_infractions,
    }
    .to_response())
}

// =============================================================================
// User Management
// =============================================================================

/// One row of the user management table. Accounts without a role are not
/// listed here; they sit in the access request queue until approved.
#[derive(Debug, FromQueryResult)]
pub struct UserWithRole {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub created_at: chrono::NaiveDateTime,
    pub role: String,
}

#[derive(Template)]
#[template(path = "admin/users.html")]
struct UsersTemplate {
    client: ClientCtx,
    users: Vec<UserWithRole>,
    notice: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct UsersQuery {
    notice: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct UpdateRoleForm {
    csrf_token: String,
    role: String,
}

#[derive(Deserialize)]
struct ConfirmForm {
    csrf_token: String,
}

async fn list_users_with_roles() -> Result<Vec<UserWithRole>, sea_orm::DbErr> {
    let sql = r#"
        SELECT u.id, u.name, u.email, u.created_at, CAST(r.role AS varchar) AS role
        FROM users u
        INNER JOIN user_roles r ON r.user_id = u.id
        ORDER BY u.name ASC
    "#;

    UserWithRole::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![],
    ))
    .all(get_db_pool())
    .await
}

#[get("/admin/users")]
async fn view_users(
    client: ClientCtx,
    query: web::Query<UsersQuery>,
) -> Result<impl Responder, Error> {
    client.require_admin()?;

    let users = list_users_with_roles().await.map_err(|e| {
        log::error!("Failed to list users: {}", e);
        error::ErrorInternalServerError("Database error")
    })?;

    let notice = match query.notice.as_deref() {
        Some("role_updated") => Some("Role updated.".to_owned()),
        Some("user_deleted") => Some("Account removed.".to_owned()),
        _ => None,
    };
    let error = match query.error.as_deref() {
        Some("no_role") => {
            Some("That account has no role yet. Approve its access request first.".to_owned())
        }
        Some("not_admin") => Some("That account is not an administrator.".to_owned()),
        Some("last_admin") => Some("At least one administrator must remain.".to_owned()),
        _ => None,
    };

    Ok(UsersTemplate {
        client,
        users,
        notice,
        error,
    }
    .to_response())
}

/// Promote a member to admin or demote an admin back to member. The demote
/// statement carries its own guard so the last admin can never be demoted,
/// no matter how requests interleave.
#[post("/admin/users/{id}/role")]
async fn update_user_role(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<UpdateRoleForm>,
) -> Result<HttpResponse, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    client.require_admin()?;
    let user_id = path.into_inner();
    let db = get_db_pool();

    let result = match form.role.as_str() {
        "admin" => user::promote_to_admin(db, user_id).await,
        "member" => user::demote_to_member(db, user_id).await,
        _ => return Err(error::ErrorBadRequest("Unknown role")),
    };

    match result {
        Ok(()) => {}
        Err(UserAdminError::NoRole) => return Ok(redirect_to("/admin/users?error=no_role")),
        Err(UserAdminError::NotAdmin) => return Ok(redirect_to("/admin/users?error=not_admin")),
        Err(UserAdminError::LastAdmin) => return Ok(redirect_to("/admin/users?error=last_admin")),
        Err(e) => {
            log::error!("Failed to change role of user {}: {}", user_id, e);
            return Err(error::ErrorInternalServerError("Database error"));
        }
    }

    log::info!(
        "Role of user_id={} set to {} by {}",
        user_id,
        form.role,
        client.get_name()
    );

    Ok(redirect_to("/admin/users?notice=role_updated"))
}

/// Remove an account. History tables keep the display name, so past
/// infractions, deletions, and audit entries survive the removal.
#[post("/admin/users/{id}/delete")]
async fn delete_user(
    client: ClientCtx,
    cookies: actix_session::Session,
    path: web::Path<i32>,
    form: web::Form<ConfirmForm>,
) -> Result<HttpResponse, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let admin = client.require_admin()?;
    let user_id = path.into_inner();

    match user::delete_account(get_db_pool(), &admin, user_id).await {
        Ok(_) => Ok(redirect_to("/admin/users?notice=user_deleted")),
        Err(UserAdminError::SelfDeletion) => Err(error::ErrorBadRequest(
            "You cannot remove your own account.",
        )),
        Err(UserAdminError::NotFound) => Err(error::ErrorNotFound("User not found")),
        Err(UserAdminError::LastAdmin) => Ok(redirect_to("/admin/users?error=last_admin")),
        Err(e) => {
            log::error!("Failed to remove user {}: {}", user_id, e);
            Err(error::ErrorInternalServerError("Database error"))
        }
    }
}

// =============================================================================
// Audit Trail
// =============================================================================

#[derive(Template)]
#[template(path = "admin/audit_log.html")]
struct AuditLogTemplate {
    client: ClientCtx,
    entries: Vec<audit_logs::Model>,
    filter_action: String,
    filter_term: String,
}

#[derive(Deserialize)]
struct AuditQuery {
    action: Option<String>,
    q: Option<String>,
}

#[get("/admin/audit-log")]
async fn view_audit_log(
    client: ClientCtx,
    query: web::Query<AuditQuery>,
) -> Result<impl Responder, Error> {
    client.require_admin()?;
    let db = get_db_pool();

    let filter_action = query.action.clone().unwrap_or_default();
    let filter_term = query.q.clone().unwrap_or_default();

    let entries = audit::search(
        db,
        AuditAction::from_filter(&filter_action),
        Some(filter_term.as_str()),
        crate::app_config::limits().audit_log_rows,
    )
    .await
    .map_err(|e| {
        log::error!("Audit log search failed: {}", e);
        error::ErrorInternalServerError("Database error")
    })?;

    Ok(AuditLogTemplate {
        client,
        entries,
        filter_action,
        filter_term,
    }
    .to_response())
}

// =============================================================================
// Retention Cleanup
// =============================================================================

#[derive(Template)]
#[template(path = "admin/cleanup.html")]
struct CleanupTemplate {
    client: ClientCtx,
    stats: CleanupStats,
    retention_hours: i64,
    interval_secs: i64,
}

#[get("/admin/cleanup")]
async fn view_cleanup(
    client: ClientCtx,
    config: web::Data<Arc<Config>>,
) -> Result<impl Responder, Error> {
    client.require_admin()?;
    let db = get_db_pool();

    let stats = cleanup::cleanup_stats(db, &config).await.map_err(|e| {
        log::error!("Failed to compute cleanup stats: {}", e);
        error::ErrorInternalServerError("Database error")
    })?;

    Ok(CleanupTemplate {
        client,
        stats,
        retention_hours: config.deletion_retention_hours(),
        interval_secs: config.cleanup_interval_secs(),
    }
    .to_response())
}

/// Run the retention sweep now instead of waiting for the interval task.
/// Returns JSON; the cleanup panel calls this in the background.
#[post("/admin/cleanup/old-records")]
async fn cleanup_old_records(
    client: ClientCtx,
    cookies: actix_session::Session,
    config: web::Data<Arc<Config>>,
    form: web::Form<ConfirmForm>,
) -> Result<impl Responder, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let admin = client.require_admin()?;
    let db = get_db_pool();

    let report = cleanup::cleanup_old_records(db, &config, &admin.name)
        .await
        .map_err(|e| {
            log::error!("Manual record cleanup failed: {}", e);
            error::ErrorInternalServerError("Cleanup failed")
        })?;

    Ok(web::Json(serde_json::json!({
        "success": true,
        "message": format!(
            "Removed {} deletion records and {} audit entries past retention.",
            report.deleted_infractions, report.deleted_audit_logs
        ),
        "deleted_infractions": report.deleted_infractions,
        "deleted_audit_logs": report.deleted_audit_logs,
        "cleanup_timestamp": report.cleanup_timestamp.to_string(),
    })))
}

/// Expire abandoned pending deletion requests on demand.
#[post("/admin/cleanup/expired-requests")]
async fn cleanup_expired_requests(
    client: ClientCtx,
    cookies: actix_session::Session,
    form: web::Form<ConfirmForm>,
) -> Result<impl Responder, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let admin = client.require_admin()?;
    let db = get_db_pool();

    let removed = cleanup::cleanup_expired_requests(db, &admin.name)
        .await
        .map_err(|e| {
            log::error!("Manual request cleanup failed: {}", e);
            error::ErrorInternalServerError("Cleanup failed")
        })?;

    Ok(web::Json(serde_json::json!({
        "success": true,
        "message": format!("Removed {} expired pending requests.", removed),
        "expired_requests": removed,
    })))
}

// =============================================================================
// Settings Management
// =============================================================================

#[derive(Template)]
#[template(path = "admin/settings.html")]
struct SettingsTemplate {
    client: ClientCtx,
    settings: Vec<settings::Model>,
    history_key: Option<String>,
    history: Vec<setting_history::Model>,
    updated: bool,
}

#[derive(Deserialize)]
struct SettingsQuery {
    updated: Option<String>,
    history: Option<String>,
}

#[derive(Deserialize)]
struct UpdateSettingForm {
    csrf_token: String,
    key: String,
    value: String,
}

#[get("/admin/settings")]
async fn view_settings(
    client: ClientCtx,
    config: web::Data<Arc<Config>>,
    query: web::Query<SettingsQuery>,
) -> Result<impl Responder, Error> {
    client.require_admin()?;
    let db = get_db_pool();

    let settings = config.get_all(db).await.map_err(|e| {
        log::error!("Failed to fetch settings: {}", e);
        error::ErrorInternalServerError("Database error")
    })?;

    let history_key = query.history.clone().filter(|k| !k.is_empty());
    let history = match &history_key {
        Some(key) => config
            .get_setting_history(db, key, 20)
            .await
            .map_err(|e| {
                log::error!("Failed to fetch setting history: {}", e);
                error::ErrorInternalServerError("Database error")
            })?,
        None => Vec::new(),
    };

    Ok(SettingsTemplate {
        client,
        settings,
        history_key,
        history,
        updated: query.updated.is_some(),
    }
    .to_response())
}

/// POST /admin/settings - Update a setting
#[post("/admin/settings")]
async fn update_setting(
    client: ClientCtx,
    cookies: actix_session::Session,
    config: web::Data<Arc<Config>>,
    form: web::Form<UpdateSettingForm>,
) -> Result<impl Responder, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;

    let admin = client.require_admin()?;
    let db = get_db_pool();

    // Find the setting to get its type
    let setting = settings::Entity::find_by_id(form.key.clone())
        .one(db)
        .await
        .map_err(|e| {
            log::error!("Failed to find setting: {}", e);
            error::ErrorInternalServerError("Database error")
        })?
        .ok_or_else(|| error::ErrorNotFound("Setting not found"))?;

    // Parse value according to type
    let value = SettingValue::parse(&form.value, &setting.value_type)
        .ok_or_else(|| error::ErrorBadRequest("Invalid value for setting type"))?;

    config
        .set_value(db, &form.key, value, Some(admin.id))
        .await
        .map_err(|e| {
            log::error!("Failed to update setting: {}", e);
            error::ErrorInternalServerError("Failed to update setting")
        })?;

    log::info!("Setting '{}' updated by {}", form.key, admin.name);

    Ok(HttpResponse::SeeOther()
        .append_header(("Location", "/admin/settings?updated=1"))
        .finish())
}

fn redirect_to(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header(("Location", location.to_owned()))
        .finish()
}
