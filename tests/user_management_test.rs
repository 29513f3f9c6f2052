//! Tests for role changes and account removal, in particular the floor that
//! keeps the last administrator in place.

mod common;
use serial_test::serial;

use chrono::{Duration, Utc};
use common::{database::*, fixtures::*};
use corregedoria::audit;
use corregedoria::orm::audit_logs::AuditAction;
use corregedoria::orm::infractions::Severity;
use corregedoria::orm::access_requests::{self, AccessStatus};
use corregedoria::orm::user_roles;
use corregedoria::orm::{sessions, users};
use corregedoria::role::{admin_count, resolve_role, Role};
use corregedoria::user::{delete_account, demote_to_member, promote_to_admin, UserAdminError};
use sea_orm::{entity::*, query::*};

#[actix_rt::test]
#[serial]
async fn test_promote_member_to_admin() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let member = create_test_member(&db, "rising_star", "password123")
        .await
        .expect("Failed to create member");

    promote_to_admin(&db, member.id)
        .await
        .expect("Promotion should succeed");

    let role = resolve_role(&db, member.id)
        .await
        .expect("Role lookup should succeed");
    assert_eq!(role, Role::Admin);

    // The promotion invalidated the cache, so the cached path sees it too
    assert_eq!(corregedoria::role::get_role(&db, member.id).await, Role::Admin);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_promote_roleless_user_fails() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let outsider = create_test_user(&db, "unapproved", "password123")
        .await
        .expect("Failed to create user");

    let result = promote_to_admin(&db, outsider.id).await;
    assert!(matches!(result, Err(UserAdminError::NoRole)));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_demote_with_two_admins() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    create_test_admin(&db, "staying_admin", "password123")
        .await
        .expect("Failed to create admin");
    let leaving = create_test_admin(&db, "leaving_admin", "password123")
        .await
        .expect("Failed to create admin");

    demote_to_member(&db, leaving.id)
        .await
        .expect("Demotion should succeed with another admin present");

    let role = resolve_role(&db, leaving.id)
        .await
        .expect("Role lookup should succeed");
    assert_eq!(role, Role::Member);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_demote_last_admin_blocked() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let only_admin = create_test_admin(&db, "only_admin", "password123")
        .await
        .expect("Failed to create admin");

    let result = demote_to_member(&db, only_admin.id).await;
    assert!(matches!(result, Err(UserAdminError::LastAdmin)));

    // The role row is untouched
    let role = resolve_role(&db, only_admin.id)
        .await
        .expect("Role lookup should succeed");
    assert_eq!(role, Role::Admin);
    assert_eq!(admin_count(&db).await.expect("Count should succeed"), 1);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_demote_member_fails() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let member = create_test_member(&db, "plain_member", "password123")
        .await
        .expect("Failed to create member");

    let result = demote_to_member(&db, member.id).await;
    assert!(matches!(result, Err(UserAdminError::NotAdmin)));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_delete_member_account_cascades() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let admin = create_test_admin(&db, "remover", "password123")
        .await
        .expect("Failed to create admin");
    let member = create_test_member(&db, "departing", "password123")
        .await
        .expect("Failed to create member");

    // Rows that hang off the account
    sessions::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        user_id: Set(member.id),
        expires_at: Set(Utc::now().naive_utc() + Duration::hours(1)),
    }
    .insert(&db)
    .await
    .expect("Failed to create session");

    create_access_request(&db, &member, AccessStatus::Approved)
        .await
        .expect("Failed to create access request");

    // History attributed by display name
    let garrison = create_test_garrison(&db, "1º Batalhão")
        .await
        .expect("Failed to create garrison");
    let infraction = create_test_infraction(&db, garrison.id, "Silva", Severity::Leve, "departing")
        .await
        .expect("Failed to create infraction");

    let removed = delete_account(&db, &admin.actor(Role::Admin), member.id)
        .await
        .expect("Deletion should succeed");
    assert_eq!(removed.name, "departing");

    // Account and its dependent rows are gone
    let user_gone = users::Entity::find_by_id(member.id)
        .one(&db)
        .await
        .expect("Query should succeed");
    assert!(user_gone.is_none());

    let session_rows = sessions::Entity::find()
        .filter(sessions::Column::UserId.eq(member.id))
        .count(&db)
        .await
        .expect("Count should succeed");
    assert_eq!(session_rows, 0);

    let request_rows = access_requests::Entity::find()
        .filter(access_requests::Column::UserId.eq(member.id))
        .count(&db)
        .await
        .expect("Count should succeed");
    assert_eq!(request_rows, 0);

    let role_rows = user_roles::Entity::find()
        .filter(user_roles::Column::UserId.eq(member.id))
        .count(&db)
        .await
        .expect("Count should succeed");
    assert_eq!(role_rows, 0);

    // Name-attributed history survives
    let kept = corregedoria::infractions::find_by_id(&db, infraction.id)
        .await
        .expect("Query should succeed")
        .expect("Infraction should remain");
    assert_eq!(kept.registered_by, "departing");

    // The removal is on the audit trail
    let entries = audit::search(&db, Some(AuditAction::Delete), Some("users"), 10)
        .await
        .expect("Audit search should succeed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record_id, member.id);
    assert_eq!(entries[0].user_name, "remover");
    let details = entries[0].details.as_ref().expect("Details should be set");
    assert_eq!(details["name"], "departing");
    assert_eq!(details["role"], "member");

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_delete_admin_with_two_admins() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let remover = create_test_admin(&db, "surviving_admin", "password123")
        .await
        .expect("Failed to create admin");
    let target = create_test_admin(&db, "doomed_admin", "password123")
        .await
        .expect("Failed to create admin");

    delete_account(&db, &remover.actor(Role::Admin), target.id)
        .await
        .expect("Deletion should succeed with another admin present");

    assert_eq!(admin_count(&db).await.expect("Count should succeed"), 1);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_delete_last_admin_blocked() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    // The acting session claims admin, but its role row is already gone.
    // Without the guard this would leave the system with no admin at all.
    let stale_session = create_test_user(&db, "stale_session", "password123")
        .await
        .expect("Failed to create user");
    let only_admin = create_test_admin(&db, "last_standing", "password123")
        .await
        .expect("Failed to create admin");

    let result = delete_account(&db, &stale_session.actor(Role::Admin), only_admin.id).await;
    assert!(matches!(result, Err(UserAdminError::LastAdmin)));

    // Nothing changed
    let still_there = users::Entity::find_by_id(only_admin.id)
        .one(&db)
        .await
        .expect("Query should succeed");
    assert!(still_there.is_some());

    let role = resolve_role(&db, only_admin.id)
        .await
        .expect("Role lookup should succeed");
    assert_eq!(role, Role::Admin);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_delete_own_account_blocked() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let admin = create_test_admin(&db, "self_deleter", "password123")
        .await
        .expect("Failed to create admin");

    let result = delete_account(&db, &admin.actor(Role::Admin), admin.id).await;
    assert!(matches!(result, Err(UserAdminError::SelfDeletion)));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_delete_missing_user() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let admin = create_test_admin(&db, "searching_admin", "password123")
        .await
        .expect("Failed to create admin");

    let result = delete_account(&db, &admin.actor(Role::Admin), 999_999).await;
    assert!(matches!(result, Err(UserAdminError::NotFound)));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}
