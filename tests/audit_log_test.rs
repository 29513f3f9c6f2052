//! Tests for audit trail recording and search.

mod common;
use serial_test::serial;

use common::database::*;
use corregedoria::audit;
use corregedoria::orm::audit_logs::AuditAction;

#[actix_rt::test]
#[serial]
async fn test_search_by_action() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    audit::append(&db, AuditAction::Create, "infractions", 1, "alice", None)
        .await
        .expect("Append should succeed");
    audit::append(&db, AuditAction::Create, "infractions", 2, "alice", None)
        .await
        .expect("Append should succeed");
    audit::append(&db, AuditAction::Delete, "infractions", 1, "bob", None)
        .await
        .expect("Append should succeed");

    let creates = audit::search(&db, Some(AuditAction::Create), None, 100)
        .await
        .expect("Search should succeed");
    assert_eq!(creates.len(), 2);

    let deletes = audit::search(&db, Some(AuditAction::Delete), None, 100)
        .await
        .expect("Search should succeed");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].user_name, "bob");

    let cleanups = audit::search(&db, Some(AuditAction::Cleanup), None, 100)
        .await
        .expect("Search should succeed");
    assert!(cleanups.is_empty());

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_search_term_matches_every_field() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    audit::append(
        &db,
        AuditAction::Create,
        "infractions",
        41,
        "alice",
        Some(serde_json::json!({ "officer_name": "Silva" })),
    )
    .await
    .expect("Append should succeed");
    audit::append(&db, AuditAction::Delete, "infractions", 42, "bob", None)
        .await
        .expect("Append should succeed");
    audit::append(&db, AuditAction::Create, "users", 7, "carol", None)
        .await
        .expect("Append should succeed");

    // Acting user, case-insensitive
    let by_user = audit::search(&db, None, Some("BOB"), 100)
        .await
        .expect("Search should succeed");
    assert_eq!(by_user.len(), 1);
    assert_eq!(by_user[0].record_id, 42);

    // Table name
    let by_table = audit::search(&db, None, Some("users"), 100)
        .await
        .expect("Search should succeed");
    assert_eq!(by_table.len(), 1);
    assert_eq!(by_table[0].user_name, "carol");

    // Record id, exact
    let by_id = audit::search(&db, None, Some("42"), 100)
        .await
        .expect("Search should succeed");
    assert_eq!(by_id.len(), 1);
    assert_eq!(by_id[0].user_name, "bob");

    // Inside the detail blob
    let by_detail = audit::search(&db, None, Some("Silva"), 100)
        .await
        .expect("Search should succeed");
    assert_eq!(by_detail.len(), 1);
    assert_eq!(by_detail[0].record_id, 41);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_search_combines_action_and_term() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    audit::append(&db, AuditAction::Create, "infractions", 1, "alice", None)
        .await
        .expect("Append should succeed");
    audit::append(&db, AuditAction::Delete, "infractions", 1, "alice", None)
        .await
        .expect("Append should succeed");

    let narrowed = audit::search(&db, Some(AuditAction::Delete), Some("alice"), 100)
        .await
        .expect("Search should succeed");
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].action_type, AuditAction::Delete);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_search_newest_first_with_limit() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    for record_id in 1..=5 {
        audit::append(&db, AuditAction::Create, "infractions", record_id, "alice", None)
            .await
            .expect("Append should succeed");
    }

    let capped = audit::search(&db, None, None, 3)
        .await
        .expect("Search should succeed");

    let ids: Vec<i32> = capped.iter().map(|e| e.record_id).collect();
    assert_eq!(ids, vec![5, 4, 3], "Newest entries come first");

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_blank_term_is_ignored() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    audit::append(&db, AuditAction::Create, "infractions", 1, "alice", None)
        .await
        .expect("Append should succeed");
    audit::append(&db, AuditAction::Delete, "infractions", 1, "bob", None)
        .await
        .expect("Append should succeed");

    let all = audit::search(&db, None, Some("   "), 100)
        .await
        .expect("Search should succeed");
    assert_eq!(all.len(), 2, "Whitespace-only terms must not filter");

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}
