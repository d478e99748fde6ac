//! BranchStore interface tests.
//!
//! These tests verify the contract of the BranchStore trait.
//! Each storage implementation should run these tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use chronicler::model::{Branch, WorldTime};
use chronicler::storage::helpers::now;
use chronicler::storage::{BranchStore, StorageError};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// A root branch in `campaign`, created `offset_ms` after a fixed base.
pub fn make_branch(campaign: &str, name: &str, offset_ms: i64) -> Branch {
    let base = base_time();
    Branch {
        id: Uuid::new_v4(),
        campaign_id: campaign.to_string(),
        name: name.to_string(),
        description: None,
        parent_id: None,
        diverged_at: None,
        created_at: base + Duration::milliseconds(offset_ms),
        deleted_at: None,
    }
}

pub fn make_child(parent: &Branch, name: &str, offset_ms: i64, diverged_at: i64) -> Branch {
    Branch {
        parent_id: Some(parent.id),
        diverged_at: Some(WorldTime(diverged_at)),
        ..make_branch(&parent.campaign_id, name, offset_ms)
    }
}

/// Campaign id unique to one test run.
pub fn campaign(name: &str) -> String {
    format!("{}-{}", name, Uuid::new_v4())
}

// =============================================================================
// BranchStore::insert / get tests
// =============================================================================

pub async fn test_insert_and_get<S: BranchStore>(store: &S) {
    let mut branch = make_branch(&campaign("test_insert"), "main", 0);
    branch.description = Some("the canon timeline".to_string());

    store.insert(&branch).await.expect("insert should succeed");

    let loaded = store
        .get(branch.id)
        .await
        .expect("get should succeed")
        .expect("branch should exist");
    assert_eq!(loaded, branch);
}

pub async fn test_insert_child_preserves_fork_fields<S: BranchStore>(store: &S) {
    let root = make_branch(&campaign("test_child_fields"), "main", 0);
    let child = make_child(&root, "alt", 1, 42);
    store.insert(&root).await.unwrap();
    store.insert(&child).await.unwrap();

    let loaded = store.get(child.id).await.unwrap().unwrap();
    assert_eq!(loaded.parent_id, Some(root.id));
    assert_eq!(loaded.diverged_at, Some(WorldTime(42)));
}

pub async fn test_insert_duplicate_id<S: BranchStore>(store: &S) {
    let branch = make_branch(&campaign("test_duplicate"), "main", 0);
    store.insert(&branch).await.unwrap();

    let result = store.insert(&branch).await;
    assert!(matches!(result, Err(StorageError::DuplicateBranch(id)) if id == branch.id));
}

pub async fn test_get_missing<S: BranchStore>(store: &S) {
    assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
}

// =============================================================================
// BranchStore listing tests
// =============================================================================

pub async fn test_list_by_campaign_in_creation_order<S: BranchStore>(store: &S) {
    let campaign = campaign("test_list_campaign");
    let later = make_branch(&campaign, "later", 20);
    let first = make_branch(&campaign, "first", 0);
    let middle = make_branch(&campaign, "middle", 10);
    let other = make_branch(&self::campaign("test_list_other"), "other", 5);

    for branch in [&later, &first, &middle, &other] {
        store.insert(branch).await.unwrap();
    }

    let listed = store.list_by_campaign(&campaign).await.unwrap();
    assert_eq!(
        listed.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
        vec!["first", "middle", "later"]
    );
}

pub async fn test_list_children<S: BranchStore>(store: &S) {
    let root = make_branch(&campaign("test_children"), "main", 0);
    let a = make_child(&root, "a", 1, 1);
    let b = make_child(&root, "b", 2, 2);
    let grandchild = make_child(&a, "a1", 3, 3);
    for branch in [&root, &a, &b, &grandchild] {
        store.insert(branch).await.unwrap();
    }

    let children = store.list_children(root.id).await.unwrap();
    assert_eq!(
        children.iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![a.id, b.id]
    );
    assert!(store.list_children(b.id).await.unwrap().is_empty());
}

// =============================================================================
// BranchStore::mark_deleted tests
// =============================================================================

pub async fn test_mark_deleted<S: BranchStore>(store: &S) {
    let campaign = campaign("test_mark_deleted");
    let branch = make_branch(&campaign, "main", 0);
    store.insert(&branch).await.unwrap();

    let at = now();
    let deleted = store.mark_deleted(branch.id, at).await.unwrap();
    assert_eq!(deleted.deleted_at, Some(at));

    let loaded = store.get(branch.id).await.unwrap().expect("soft-deleted rows stay readable");
    assert!(loaded.is_deleted());
    assert!(store.list_by_campaign(&campaign).await.unwrap().is_empty());
}

pub async fn test_mark_deleted_twice_is_not_found<S: BranchStore>(store: &S) {
    let branch = make_branch(&campaign("test_delete_twice"), "main", 0);
    store.insert(&branch).await.unwrap();
    store.mark_deleted(branch.id, now()).await.unwrap();

    let result = store.mark_deleted(branch.id, now()).await;
    assert!(matches!(result, Err(StorageError::BranchNotFound(_))));

    let result = store.mark_deleted(Uuid::new_v4(), now()).await;
    assert!(matches!(result, Err(StorageError::BranchNotFound(_))));
}

pub async fn test_mark_deleted_with_live_children<S: BranchStore>(store: &S) {
    let root = make_branch(&campaign("test_delete_guard"), "main", 0);
    let child = make_child(&root, "alt", 1, 5);
    store.insert(&root).await.unwrap();
    store.insert(&child).await.unwrap();

    let result = store.mark_deleted(root.id, now()).await;
    assert!(matches!(
        result,
        Err(StorageError::HasChildren { children: 1, .. })
    ));
    assert!(!store.get(root.id).await.unwrap().unwrap().is_deleted());

    store.mark_deleted(child.id, now()).await.unwrap();
    store
        .mark_deleted(root.id, now())
        .await
        .expect("deleted children no longer block");
    assert!(store.list_children(root.id).await.unwrap().is_empty());
}

pub async fn test_deleted_at_sorts_after_creation<S: BranchStore>(store: &S) {
    let branch = make_branch(&campaign("test_deleted_at"), "main", 0);
    store.insert(&branch).await.unwrap();
    let deleted = store.mark_deleted(branch.id, now()).await.unwrap();
    assert!(deleted.deleted_at.unwrap() > branch.created_at);
    assert!(deleted.deleted_at.unwrap() <= Utc::now());
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all BranchStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_branch_store_tests {
    ($store:expr) => {
        use $crate::storage::branch_store_tests::*;

        test_insert_and_get($store).await;
        println!("  test_insert_and_get: PASSED");

        test_insert_child_preserves_fork_fields($store).await;
        println!("  test_insert_child_preserves_fork_fields: PASSED");

        test_insert_duplicate_id($store).await;
        println!("  test_insert_duplicate_id: PASSED");

        test_get_missing($store).await;
        println!("  test_get_missing: PASSED");

        test_list_by_campaign_in_creation_order($store).await;
        println!("  test_list_by_campaign_in_creation_order: PASSED");

        test_list_children($store).await;
        println!("  test_list_children: PASSED");

        test_mark_deleted($store).await;
        println!("  test_mark_deleted: PASSED");

        test_mark_deleted_twice_is_not_found($store).await;
        println!("  test_mark_deleted_twice_is_not_found: PASSED");

        test_mark_deleted_with_live_children($store).await;
        println!("  test_mark_deleted_with_live_children: PASSED");

        test_deleted_at_sorts_after_creation($store).await;
        println!("  test_deleted_at_sorts_after_creation: PASSED");
    };
}
