//! Tests for the role-gated deletion workflow:
//! - Admins delete immediately, leaving a snapshot row
//! - Members file a request an admin must approve, capped by a daily quota
//! - Approval performs the deletion attributed to the requester
//! - Every transition happens exactly once, first writer wins

mod common;
use serial_test::serial;

use common::{database::*, fixtures::*};
use corregedoria::config::Config;
use corregedoria::deletions::{
    approve_request, daily_deletion_count, deny_request, list_requests, request_deletion,
    DeletionError, DeletionOutcome,
};
use corregedoria::orm::deletion_requests::{self, RequestStatus};
use corregedoria::orm::infraction_deletions;
use corregedoria::orm::infractions::Severity;
use corregedoria::role::Role;
use sea_orm::{entity::*, query::*};

#[actix_rt::test]
#[serial]
async fn test_admin_delete_removes_row_and_keeps_snapshot() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let admin = create_test_admin(&db, "delete_admin", "password123")
        .await
        .expect("Failed to create admin");
    let garrison = create_test_garrison(&db, "1º Batalhão")
        .await
        .expect("Failed to create garrison");
    let infraction = create_test_infraction(&db, garrison.id, "Silva", Severity::Grave, "someone")
        .await
        .expect("Failed to create infraction");

    let config = Config::new();
    let outcome = request_deletion(
        &db,
        &config,
        &admin.actor(Role::Admin),
        infraction.id,
        "duplicate entry",
    )
    .await
    .expect("Admin deletion should succeed");

    assert!(matches!(outcome, DeletionOutcome::Deleted));

    // The infraction row is gone
    let remaining = corregedoria::infractions::find_by_id(&db, infraction.id)
        .await
        .expect("Query should succeed");
    assert!(remaining.is_none(), "Infraction should be deleted");

    // A snapshot row records the deletion
    let snapshot = infraction_deletions::Entity::find()
        .filter(infraction_deletions::Column::InfractionId.eq(infraction.id))
        .one(&db)
        .await
        .expect("Query should succeed")
        .expect("Snapshot row should exist");

    assert_eq!(snapshot.deleted_by, "delete_admin");
    assert_eq!(snapshot.deleted_by_id, admin.id);
    assert_eq!(snapshot.deletion_reason, "duplicate entry");
    assert_eq!(snapshot.original_data["officer_name"], "Silva");

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_admin_delete_is_not_limited_by_quota() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let admin = create_test_admin(&db, "busy_admin", "password123")
        .await
        .expect("Failed to create admin");
    let garrison = create_test_garrison(&db, "2º Batalhão")
        .await
        .expect("Failed to create garrison");

    // Admin already has more completed deletions today than the default limit
    for i in 0..5 {
        create_deletion_record(&db, 1000 + i, &admin, 0)
            .await
            .expect("Failed to create deletion record");
    }

    let infraction = create_test_infraction(&db, garrison.id, "Souza", Severity::Leve, "someone")
        .await
        .expect("Failed to create infraction");

    let config = Config::new();
    let outcome = request_deletion(
        &db,
        &config,
        &admin.actor(Role::Admin),
        infraction.id,
        "cleanup",
    )
    .await
    .expect("Admin deletion should succeed regardless of quota");

    assert!(matches!(outcome, DeletionOutcome::Deleted));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_member_files_pending_request() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let member = create_test_member(&db, "requester", "password123")
        .await
        .expect("Failed to create member");
    let garrison = create_test_garrison(&db, "3º Batalhão")
        .await
        .expect("Failed to create garrison");
    let infraction = create_test_infraction(&db, garrison.id, "Costa", Severity::Media, "someone")
        .await
        .expect("Failed to create infraction");

    let config = Config::new();
    let outcome = request_deletion(
        &db,
        &config,
        &member.actor(Role::Member),
        infraction.id,
        "entered twice",
    )
    .await
    .expect("Filing a request should succeed");

    let request = match outcome {
        DeletionOutcome::Requested(request) => request,
        other => panic!("Expected Requested, got {:?}", other),
    };

    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.requested_by_name, "requester");
    assert_eq!(request.original_data["officer_name"], "Costa");
    assert!(request.expires_at > request.created_at);

    // The infraction itself is untouched
    let still_there = corregedoria::infractions::find_by_id(&db, infraction.id)
        .await
        .expect("Query should succeed");
    assert!(still_there.is_some(), "Infraction must survive a request");

    // A pending request does not count against the quota
    let used = daily_deletion_count(&db, member.id)
        .await
        .expect("Count should succeed");
    assert_eq!(used, 0);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_member_quota_exhausted() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let member = create_test_member(&db, "quota_member", "password123")
        .await
        .expect("Failed to create member");
    let garrison = create_test_garrison(&db, "4º Batalhão")
        .await
        .expect("Failed to create garrison");

    // Default limit is 3; fill it with completed deletions from today
    for i in 0..3 {
        create_deletion_record(&db, 2000 + i, &member, 0)
            .await
            .expect("Failed to create deletion record");
    }

    let infraction = create_test_infraction(&db, garrison.id, "Ramos", Severity::Leve, "someone")
        .await
        .expect("Failed to create infraction");

    let config = Config::new();
    let result = request_deletion(
        &db,
        &config,
        &member.actor(Role::Member),
        infraction.id,
        "one too many",
    )
    .await;

    match result {
        Err(DeletionError::QuotaExceeded { limit }) => assert_eq!(limit, 3),
        other => panic!("Expected QuotaExceeded, got {:?}", other),
    }

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_quota_ignores_deletions_from_previous_days() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let member = create_test_member(&db, "fresh_member", "password123")
        .await
        .expect("Failed to create member");
    let garrison = create_test_garrison(&db, "5º Batalhão")
        .await
        .expect("Failed to create garrison");

    // Three deletions, but from over a day ago
    for i in 0..3 {
        create_deletion_record(&db, 3000 + i, &member, 30)
            .await
            .expect("Failed to create deletion record");
    }

    let used = daily_deletion_count(&db, member.id)
        .await
        .expect("Count should succeed");
    assert_eq!(used, 0, "Quota resets with the calendar day");

    let infraction = create_test_infraction(&db, garrison.id, "Alves", Severity::Leve, "someone")
        .await
        .expect("Failed to create infraction");

    let config = Config::new();
    let outcome = request_deletion(
        &db,
        &config,
        &member.actor(Role::Member),
        infraction.id,
        "stale record",
    )
    .await
    .expect("Request should be allowed on a fresh day");

    assert!(matches!(outcome, DeletionOutcome::Requested(_)));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_unapproved_user_cannot_delete() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let outsider = create_test_user(&db, "outsider", "password123")
        .await
        .expect("Failed to create user");
    let garrison = create_test_garrison(&db, "6º Batalhão")
        .await
        .expect("Failed to create garrison");
    let infraction = create_test_infraction(&db, garrison.id, "Lima", Severity::Leve, "someone")
        .await
        .expect("Failed to create infraction");

    let config = Config::new();
    let result = request_deletion(
        &db,
        &config,
        &outsider.actor(Role::None),
        infraction.id,
        "should not work",
    )
    .await;

    assert!(matches!(result, Err(DeletionError::Unauthorized)));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_delete_missing_infraction() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let admin = create_test_admin(&db, "gone_admin", "password123")
        .await
        .expect("Failed to create admin");

    let config = Config::new();
    let result = request_deletion(
        &db,
        &config,
        &admin.actor(Role::Admin),
        999_999,
        "nothing there",
    )
    .await;

    assert!(matches!(result, Err(DeletionError::InfractionGone)));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_approval_attributes_deletion_to_requester() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let member = create_test_member(&db, "the_requester", "password123")
        .await
        .expect("Failed to create member");
    let admin = create_test_admin(&db, "the_approver", "password123")
        .await
        .expect("Failed to create admin");
    let garrison = create_test_garrison(&db, "7º Batalhão")
        .await
        .expect("Failed to create garrison");
    let infraction = create_test_infraction(&db, garrison.id, "Dias", Severity::Grave, "someone")
        .await
        .expect("Failed to create infraction");

    let request = create_pending_request(&db, &infraction, &member, 72)
        .await
        .expect("Failed to file request");

    let processed = approve_request(&db, &admin.actor(Role::Admin), request.id)
        .await
        .expect("Approval should succeed");

    assert_eq!(processed.status, RequestStatus::Approved);
    assert_eq!(processed.processed_by_name.as_deref(), Some("the_approver"));

    // The infraction is gone
    let remaining = corregedoria::infractions::find_by_id(&db, infraction.id)
        .await
        .expect("Query should succeed");
    assert!(remaining.is_none());

    // The snapshot row names the requester, not the admin
    let snapshot = infraction_deletions::Entity::find()
        .filter(infraction_deletions::Column::InfractionId.eq(infraction.id))
        .one(&db)
        .await
        .expect("Query should succeed")
        .expect("Snapshot row should exist");

    assert_eq!(snapshot.deleted_by, "the_requester");
    assert_eq!(snapshot.deleted_by_id, member.id);

    // And it is the requester's quota that is consumed
    let member_used = daily_deletion_count(&db, member.id)
        .await
        .expect("Count should succeed");
    let admin_used = daily_deletion_count(&db, admin.id)
        .await
        .expect("Count should succeed");
    assert_eq!(member_used, 1);
    assert_eq!(admin_used, 0);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_request_processed_exactly_once() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let member = create_test_member(&db, "once_member", "password123")
        .await
        .expect("Failed to create member");
    let admin = create_test_admin(&db, "once_admin", "password123")
        .await
        .expect("Failed to create admin");
    let garrison = create_test_garrison(&db, "8º Batalhão")
        .await
        .expect("Failed to create garrison");
    let infraction = create_test_infraction(&db, garrison.id, "Melo", Severity::Leve, "someone")
        .await
        .expect("Failed to create infraction");

    let request = create_pending_request(&db, &infraction, &member, 72)
        .await
        .expect("Failed to file request");

    approve_request(&db, &admin.actor(Role::Admin), request.id)
        .await
        .expect("First approval should succeed");

    // Second approval hits the conditional transition and fails
    let second = approve_request(&db, &admin.actor(Role::Admin), request.id).await;
    assert!(matches!(second, Err(DeletionError::RequestNotPending)));

    // Denying an approved request also fails
    let deny = deny_request(&db, &admin.actor(Role::Admin), request.id).await;
    assert!(matches!(deny, Err(DeletionError::RequestNotPending)));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_deny_leaves_infraction_untouched() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let member = create_test_member(&db, "denied_member", "password123")
        .await
        .expect("Failed to create member");
    let admin = create_test_admin(&db, "denying_admin", "password123")
        .await
        .expect("Failed to create admin");
    let garrison = create_test_garrison(&db, "9º Batalhão")
        .await
        .expect("Failed to create garrison");
    let infraction = create_test_infraction(&db, garrison.id, "Nunes", Severity::Media, "someone")
        .await
        .expect("Failed to create infraction");

    let request = create_pending_request(&db, &infraction, &member, 72)
        .await
        .expect("Failed to file request");

    deny_request(&db, &admin.actor(Role::Admin), request.id)
        .await
        .expect("Denial should succeed");

    // Request is archived as denied with the admin's name on it
    let archived = deletion_requests::Entity::find_by_id(request.id)
        .one(&db)
        .await
        .expect("Query should succeed")
        .expect("Request row should remain");
    assert_eq!(archived.status, RequestStatus::Denied);
    assert_eq!(archived.processed_by_name.as_deref(), Some("denying_admin"));

    // The infraction survives and no snapshot row was written
    let still_there = corregedoria::infractions::find_by_id(&db, infraction.id)
        .await
        .expect("Query should succeed");
    assert!(still_there.is_some());

    let snapshots = infraction_deletions::Entity::find()
        .count(&db)
        .await
        .expect("Count should succeed");
    assert_eq!(snapshots, 0);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_approval_rolls_back_when_infraction_gone() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let member = create_test_member(&db, "race_member", "password123")
        .await
        .expect("Failed to create member");
    let admin = create_test_admin(&db, "race_admin", "password123")
        .await
        .expect("Failed to create admin");
    let garrison = create_test_garrison(&db, "10º Batalhão")
        .await
        .expect("Failed to create garrison");
    let infraction = create_test_infraction(&db, garrison.id, "Pinto", Severity::Grave, "someone")
        .await
        .expect("Failed to create infraction");

    let request = create_pending_request(&db, &infraction, &member, 72)
        .await
        .expect("Failed to file request");

    // The admin deletes the infraction directly while the request waits
    let config = Config::new();
    request_deletion(
        &db,
        &config,
        &admin.actor(Role::Admin),
        infraction.id,
        "direct removal",
    )
    .await
    .expect("Direct deletion should succeed");

    // Approving the now-stale request fails and rolls back
    let result = approve_request(&db, &admin.actor(Role::Admin), request.id).await;
    assert!(matches!(result, Err(DeletionError::InfractionGone)));

    // The rollback leaves the request pending so the admin can deny it
    let unchanged = deletion_requests::Entity::find_by_id(request.id)
        .one(&db)
        .await
        .expect("Query should succeed")
        .expect("Request row should remain");
    assert_eq!(
        unchanged.status,
        RequestStatus::Pending,
        "Failed approval must not consume the request"
    );

    // Only the direct deletion left a snapshot
    let snapshots = infraction_deletions::Entity::find()
        .count(&db)
        .await
        .expect("Count should succeed");
    assert_eq!(snapshots, 1);

    // Denying clears the queue
    deny_request(&db, &admin.actor(Role::Admin), request.id)
        .await
        .expect("Denial should succeed");

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_list_requests_scopes_by_role() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let member_a = create_test_member(&db, "member_a", "password123")
        .await
        .expect("Failed to create member");
    let member_b = create_test_member(&db, "member_b", "password123")
        .await
        .expect("Failed to create member");
    let admin = create_test_admin(&db, "list_admin", "password123")
        .await
        .expect("Failed to create admin");
    let garrison = create_test_garrison(&db, "11º Batalhão")
        .await
        .expect("Failed to create garrison");

    let first = create_test_infraction(&db, garrison.id, "Rocha", Severity::Leve, "someone")
        .await
        .expect("Failed to create infraction");
    let second = create_test_infraction(&db, garrison.id, "Teles", Severity::Leve, "someone")
        .await
        .expect("Failed to create infraction");

    create_pending_request(&db, &first, &member_a, 72)
        .await
        .expect("Failed to file request");
    let request_b = create_pending_request(&db, &second, &member_b, 72)
        .await
        .expect("Failed to file request");

    // Members see only their own requests
    let own = list_requests(&db, &member_a.actor(Role::Member), None)
        .await
        .expect("Listing should succeed");
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].requested_by_name, "member_a");

    // Admins see the whole queue
    let all = list_requests(&db, &admin.actor(Role::Admin), None)
        .await
        .expect("Listing should succeed");
    assert_eq!(all.len(), 2);

    // Status filter narrows the listing
    approve_request(&db, &admin.actor(Role::Admin), request_b.id)
        .await
        .expect("Approval should succeed");

    let pending = list_requests(
        &db,
        &admin.actor(Role::Admin),
        Some(RequestStatus::Pending),
    )
    .await
    .expect("Listing should succeed");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].requested_by_name, "member_a");

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}
