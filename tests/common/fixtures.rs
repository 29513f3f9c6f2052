//! Fixtures shared by the integration suites. Everything writes straight
//! to the tables so a suite can stage exactly the state it needs.
#![allow(dead_code)]
#![allow(clippy::needless_update)]

use chrono::{Duration, Utc};
use corregedoria::orm::access_requests::{self, AccessStatus};
use corregedoria::orm::audit_logs::{self, AuditAction};
use corregedoria::orm::deletion_requests::{self, RequestStatus};
use corregedoria::orm::infractions::Severity;
use corregedoria::orm::user_roles::UserRole;
use corregedoria::orm::{garrisons, infraction_deletions, infractions, user_roles, users};
use corregedoria::role::Role;
use corregedoria::user::Actor;
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection, DbErr};

/// An account staged for a suite, with the password kept in the clear so
/// the suite can log in as it.
pub struct TestUser {
    pub id: i32,
    pub username: String,
    pub password: String,
}

impl TestUser {
    /// Build the Actor a handler would pass down for this user.
    pub fn actor(&self, role: Role) -> Actor {
        Actor {
            id: self.id,
            name: self.username.clone(),
            role,
        }
    }
}

async fn fetch_user(db: &DatabaseConnection, user_id: i32) -> Result<users::Model, DbErr> {
    users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("fixture user {} vanished", user_id)))
}

/// Create a test user with known credentials and no role.
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<TestUser, DbErr> {
    // Hashed through the crate's own argon2 context so login() verifies it.
    let password_hash = corregedoria::session::hash_password(password)
        .map_err(|e| DbErr::Custom(format!("Password hashing failed: {}", e)))?;

    let row = users::ActiveModel {
        name: Set(username.to_string()),
        email: Set(format!("{}@test.com", username)),
        password: Set(password_hash),
        password_cipher: Set(users::Cipher::Argon2id),
        created_at: Set(Utc::now().naive_utc()),
        failed_login_attempts: Set(0),
        locked_until: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    // Truncation recycles ids, so drop any role cached for this id by an
    // earlier test.
    corregedoria::role::invalidate(row.id);

    Ok(TestUser {
        id: row.id,
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Grant a role directly, bypassing the approval flow.
pub async fn grant_role(
    db: &DatabaseConnection,
    user_id: i32,
    role: UserRole,
) -> Result<(), DbErr> {
    user_roles::ActiveModel {
        user_id: Set(user_id),
        role: Set(role),
        created_by: Set(None),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    corregedoria::role::invalidate(user_id);

    Ok(())
}

/// Create a user holding the member role.
pub async fn create_test_member(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<TestUser, DbErr> {
    let user = create_test_user(db, username, password).await?;
    grant_role(db, user.id, UserRole::Member).await?;
    Ok(user)
}

/// Create a user holding the admin role.
pub async fn create_test_admin(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<TestUser, DbErr> {
    let user = create_test_user(db, username, password).await?;
    grant_role(db, user.id, UserRole::Admin).await?;
    Ok(user)
}

/// Create a user whose failure counter sits at the ceiling, locked until
/// `minutes_until_unlock` from now. Negative minutes produce a lapsed lock.
pub async fn create_locked_test_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    minutes_until_unlock: i64,
) -> Result<TestUser, DbErr> {
    let user = create_test_user(db, username, password).await?;

    let mut row: users::ActiveModel = fetch_user(db, user.id).await?.into();
    row.failed_login_attempts = Set(5);
    row.locked_until = Set(Some(
        Utc::now().naive_utc() + Duration::minutes(minutes_until_unlock),
    ));
    row.update(db).await?;

    Ok(user)
}

pub async fn get_failed_attempts(db: &DatabaseConnection, user_id: i32) -> Result<i32, DbErr> {
    Ok(fetch_user(db, user_id).await?.failed_login_attempts)
}

pub async fn is_user_locked(db: &DatabaseConnection, user_id: i32) -> Result<bool, DbErr> {
    let user = fetch_user(db, user_id).await?;
    Ok(user
        .locked_until
        .map_or(false, |until| until > Utc::now().naive_utc()))
}

/// Create a garrison unit.
pub async fn create_test_garrison(
    db: &DatabaseConnection,
    name: &str,
) -> Result<garrisons::Model, DbErr> {
    garrisons::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Create an infraction directly, bypassing the registration handler.
pub async fn create_test_infraction(
    db: &DatabaseConnection,
    garrison_id: i32,
    officer_name: &str,
    severity: Severity,
    registered_by: &str,
) -> Result<infractions::Model, DbErr> {
    infractions::ActiveModel {
        garrison_id: Set(garrison_id),
        officer_id: Set(format!("RG-{}", officer_name.len())),
        officer_name: Set(officer_name.to_string()),
        punishment_type: Set("Advertência Verbal".to_string()),
        evidence: Set("https://evidence.test/clip".to_string()),
        severity: Set(severity),
        registered_by: Set(registered_by.to_string()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Record a completed deletion, backdated by `hours_ago`. Used to fill a
/// user's daily quota or to age rows past the retention window.
pub async fn create_deletion_record(
    db: &DatabaseConnection,
    infraction_id: i32,
    deleted_by: &TestUser,
    hours_ago: i64,
) -> Result<infraction_deletions::Model, DbErr> {
    infraction_deletions::ActiveModel {
        infraction_id: Set(infraction_id),
        deleted_by: Set(deleted_by.username.clone()),
        deleted_by_id: Set(deleted_by.id),
        deletion_reason: Set("fixture".to_string()),
        original_data: Set(serde_json::json!({ "fixture": true })),
        deleted_at: Set(Utc::now().naive_utc() - Duration::hours(hours_ago)),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// File a pending deletion request directly. A negative `expires_in_hours`
/// produces an already-expired request.
pub async fn create_pending_request(
    db: &DatabaseConnection,
    infraction: &infractions::Model,
    requester: &TestUser,
    expires_in_hours: i64,
) -> Result<deletion_requests::Model, DbErr> {
    let now = Utc::now().naive_utc();

    deletion_requests::ActiveModel {
        infraction_id: Set(infraction.id),
        requested_by_user_id: Set(requester.id),
        requested_by_name: Set(requester.username.clone()),
        deletion_reason: Set("fixture".to_string()),
        original_data: Set(serde_json::to_value(infraction)
            .map_err(|e| DbErr::Custom(format!("snapshot failed: {}", e)))?),
        status: Set(RequestStatus::Pending),
        created_at: Set(now),
        expires_at: Set(now + Duration::hours(expires_in_hours)),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Create an access request in a given state.
pub async fn create_access_request(
    db: &DatabaseConnection,
    user: &TestUser,
    status: AccessStatus,
) -> Result<access_requests::Model, DbErr> {
    let processed = !matches!(status, AccessStatus::Pending);

    access_requests::ActiveModel {
        user_id: Set(user.id),
        email: Set(format!("{}@test.com", user.username)),
        name: Set(user.username.clone()),
        reason: Set(Some("fixture".to_string())),
        status: Set(status),
        requested_at: Set(Utc::now().naive_utc()),
        processed_at: Set(processed.then(|| Utc::now().naive_utc())),
        processed_by_name: Set(processed.then(|| "fixture_admin".to_string())),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Insert an audit entry stamped `hours_ago` in the past. audit::append
/// always stamps the current time, so retention tests write rows directly.
pub async fn create_audit_entry(
    db: &DatabaseConnection,
    action: AuditAction,
    table_name: &str,
    hours_ago: i64,
) -> Result<audit_logs::Model, DbErr> {
    audit_logs::ActiveModel {
        action_type: Set(action),
        table_name: Set(table_name.to_string()),
        record_id: Set(0),
        user_name: Set("fixture".to_string()),
        details: Set(None),
        created_at: Set(Utc::now().naive_utc() - Duration::hours(hours_ago)),
        ..Default::default()
    }
    .insert(db)
    .await
}
