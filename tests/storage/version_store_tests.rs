//! VersionStore interface tests.
//!
//! These tests verify the contract of the VersionStore trait.
//! Each storage implementation should run these tests.

use std::sync::Arc;

use uuid::Uuid;

use chronicler::model::{EntityRef, NewVersion, Page, TimelineKey, WorldTime};
use chronicler::storage::helpers::is_contiguous;
use chronicler::storage::{StorageError, VersionStore};

/// A fresh timeline on a random branch.
pub fn make_key(entity_type: &str) -> TimelineKey {
    TimelineKey::new(entity_type, "e1", Uuid::new_v4())
}

pub fn make_version(valid_from: i64, marker: u8) -> NewVersion {
    NewVersion::new(vec![marker; 4], WorldTime(valid_from), "tester")
}

// =============================================================================
// VersionStore::append tests
// =============================================================================

pub async fn test_append_first_version<S: VersionStore>(store: &S) {
    let key = make_key("test_append_first");

    let v = store
        .append(&key, make_version(0, 1))
        .await
        .expect("append should succeed");

    assert_eq!(v.version, 1);
    assert_eq!(v.valid_from, WorldTime(0));
    assert!(v.is_open());
    assert_eq!(v.entity_type, key.entity_type);
    assert_eq!(v.branch_id, key.branch_id);
    assert_eq!(v.payload, vec![1; 4]);
}

pub async fn test_append_closes_previous<S: VersionStore>(store: &S) {
    let key = make_key("test_append_closes");

    let first = store.append(&key, make_version(0, 1)).await.unwrap();
    let second = store.append(&key, make_version(7, 2)).await.unwrap();

    assert_eq!(second.version, 2);
    let first = store.get(first.id).await.unwrap().expect("first exists");
    assert_eq!(first.valid_to, Some(WorldTime(7)));
    assert_eq!(store.current(&key).await.unwrap().unwrap().id, second.id);
}

pub async fn test_append_keeps_intervals_contiguous<S: VersionStore>(store: &S) {
    let key = make_key("test_append_contiguous");

    for (i, at) in [0, 3, 4, 10, 25].into_iter().enumerate() {
        store.append(&key, make_version(at, i as u8)).await.unwrap();
    }

    let timeline = store.timeline(&key).await.unwrap();
    assert_eq!(timeline.len(), 5);
    assert!(is_contiguous(&timeline), "intervals should chain without gaps");
    assert_eq!(
        timeline.iter().map(|v| v.version).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
}

pub async fn test_append_backdated_is_overlap<S: VersionStore>(store: &S) {
    let key = make_key("test_append_backdated");
    store.append(&key, make_version(10, 1)).await.unwrap();

    let earlier = store.append(&key, make_version(9, 2)).await;
    assert!(matches!(earlier, Err(StorageError::OverlapViolation { .. })));

    let same = store.append(&key, make_version(10, 2)).await;
    assert!(matches!(same, Err(StorageError::OverlapViolation { .. })));

    let timeline = store.timeline(&key).await.unwrap();
    assert_eq!(timeline.len(), 1, "failed appends must not write");
    assert!(timeline[0].is_open());
}

pub async fn test_append_expected_version<S: VersionStore>(store: &S) {
    let key = make_key("test_append_expected");

    store
        .append(&key, make_version(0, 1).expecting(0))
        .await
        .expect("create with expected 0");

    let stale = store.append(&key, make_version(1, 2).expecting(0)).await;
    assert!(matches!(
        stale,
        Err(StorageError::VersionConflict {
            expected: 0,
            actual: 1
        })
    ));

    let v = store
        .append(&key, make_version(1, 2).expecting(1))
        .await
        .expect("append with current version");
    assert_eq!(v.version, 2);
}

pub async fn test_append_records_provenance<S: VersionStore>(store: &S) {
    let key = make_key("test_append_provenance");
    let source = Uuid::new_v4();

    let v = store
        .append(
            &key,
            make_version(5, 1)
                .with_comment(Some("copied".to_string()))
                .diverged_from(source),
        )
        .await
        .unwrap();

    let stored = store.get(v.id).await.unwrap().unwrap();
    assert_eq!(stored.diverged_from_version_id, Some(source));
    assert_eq!(stored.comment.as_deref(), Some("copied"));
    assert_eq!(stored.created_by, "tester");
    assert_eq!(stored, v);
}

pub async fn test_concurrent_appends_serialize<S: VersionStore + 'static>(store: Arc<S>) {
    let key = make_key("test_concurrent_appends");
    store.append(&key, make_version(0, 0)).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8u8 {
        let store = store.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            store
                .append(&key, make_version(1 + i as i64, i).expecting(1))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(StorageError::VersionConflict { .. })
            | Err(StorageError::OverlapViolation { .. })
            | Err(StorageError::WriteConflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(winners, 1, "exactly one writer should win");
    let timeline = store.timeline(&key).await.unwrap();
    assert_eq!(timeline.len(), 2);
    assert!(is_contiguous(&timeline));
}

// =============================================================================
// VersionStore query tests
// =============================================================================

pub async fn test_get_missing<S: VersionStore>(store: &S) {
    assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
}

pub async fn test_current_empty_timeline<S: VersionStore>(store: &S) {
    let key = make_key("test_current_empty");
    assert!(store.current(&key).await.unwrap().is_none());
    assert!(store.timeline(&key).await.unwrap().is_empty());
}

pub async fn test_version_at<S: VersionStore>(store: &S) {
    let key = make_key("test_version_at");
    let v1 = store.append(&key, make_version(0, 1)).await.unwrap();
    let v2 = store.append(&key, make_version(5, 2)).await.unwrap();
    let v3 = store.append(&key, make_version(8, 3)).await.unwrap();

    let at = |t: i64| {
        let key = key.clone();
        async move { store.version_at(&key, WorldTime(t)).await.unwrap().map(|v| v.id) }
    };

    assert_eq!(at(-1).await, None, "nothing before the first version");
    assert_eq!(at(0).await, Some(v1.id));
    assert_eq!(at(4).await, Some(v1.id));
    assert_eq!(at(5).await, Some(v2.id), "valid_from is inclusive");
    assert_eq!(at(7).await, Some(v2.id));
    assert_eq!(at(8).await, Some(v3.id), "valid_to is exclusive");
    assert_eq!(at(1_000_000).await, Some(v3.id));
}

pub async fn test_version_at_before_any_append<S: VersionStore>(store: &S) {
    let key = make_key("test_version_at_empty");
    assert!(store.version_at(&key, WorldTime(0)).await.unwrap().is_none());
}

pub async fn test_history_newest_first<S: VersionStore>(store: &S) {
    let key = make_key("test_history");
    for i in 0..5 {
        store.append(&key, make_version(i * 10, i as u8)).await.unwrap();
    }

    let all = store.history(&key, Page::all()).await.unwrap();
    assert_eq!(
        all.iter().map(|v| v.version).collect::<Vec<_>>(),
        vec![5, 4, 3, 2, 1]
    );

    let page = store.history(&key, Page::new(2, 1)).await.unwrap();
    assert_eq!(
        page.iter().map(|v| v.version).collect::<Vec<_>>(),
        vec![4, 3]
    );

    let tail = store
        .history(
            &key,
            Page {
                limit: None,
                offset: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        tail.iter().map(|v| v.version).collect::<Vec<_>>(),
        vec![2, 1]
    );

    let past_end = store.history(&key, Page::new(10, 10)).await.unwrap();
    assert!(past_end.is_empty());
}

pub async fn test_timelines_are_isolated<S: VersionStore>(store: &S) {
    let branch = Uuid::new_v4();
    let a = TimelineKey::new("test_isolated", "a", branch);
    let b = TimelineKey::new("test_isolated", "b", branch);
    let a_elsewhere = TimelineKey::new("test_isolated", "a", Uuid::new_v4());

    store.append(&a, make_version(0, 1)).await.unwrap();
    store.append(&b, make_version(0, 2)).await.unwrap();
    store.append(&a_elsewhere, make_version(0, 3)).await.unwrap();
    store.append(&a, make_version(1, 4)).await.unwrap();

    assert_eq!(store.timeline(&a).await.unwrap().len(), 2);
    assert_eq!(store.timeline(&b).await.unwrap().len(), 1);
    assert_eq!(store.timeline(&a_elsewhere).await.unwrap().len(), 1);
    assert_eq!(store.current(&b).await.unwrap().unwrap().payload, vec![2; 4]);
}

pub async fn test_list_entities<S: VersionStore>(store: &S) {
    let branch = Uuid::new_v4();
    store
        .append(&TimelineKey::new("test_npc", "z", branch), make_version(0, 1))
        .await
        .unwrap();
    store
        .append(&TimelineKey::new("test_faction", "a", branch), make_version(0, 1))
        .await
        .unwrap();
    store
        .append(&TimelineKey::new("test_npc", "z", branch), make_version(1, 2))
        .await
        .unwrap();
    store
        .append(&TimelineKey::new("test_npc", "q", Uuid::new_v4()), make_version(0, 1))
        .await
        .unwrap();

    let entities = store.list_entities(branch).await.unwrap();
    assert_eq!(
        entities,
        vec![
            EntityRef::new("test_faction", "a"),
            EntityRef::new("test_npc", "z"),
        ]
    );
    assert!(store.list_entities(Uuid::new_v4()).await.unwrap().is_empty());
}

pub async fn test_rejected_append_lists_no_entity<S: VersionStore>(store: &S) {
    let branch = Uuid::new_v4();
    let key = TimelineKey::new("test_rejected", "r1", branch);

    let result = store.append(&key, make_version(0, 1).expecting(2)).await;
    assert!(matches!(
        result,
        Err(StorageError::VersionConflict {
            expected: 2,
            actual: 0
        })
    ));
    assert!(store.list_entities(branch).await.unwrap().is_empty());
    assert!(store.current(&key).await.unwrap().is_none());
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all VersionStore interface tests against a store implementation.
///
/// Takes an `Arc` of the store; the concurrency test needs to share it
/// across tasks.
#[macro_export]
macro_rules! run_version_store_tests {
    ($store:expr) => {
        use $crate::storage::version_store_tests::*;

        let store = $store;

        // append tests
        test_append_first_version(&*store).await;
        println!("  test_append_first_version: PASSED");

        test_append_closes_previous(&*store).await;
        println!("  test_append_closes_previous: PASSED");

        test_append_keeps_intervals_contiguous(&*store).await;
        println!("  test_append_keeps_intervals_contiguous: PASSED");

        test_append_backdated_is_overlap(&*store).await;
        println!("  test_append_backdated_is_overlap: PASSED");

        test_append_expected_version(&*store).await;
        println!("  test_append_expected_version: PASSED");

        test_append_records_provenance(&*store).await;
        println!("  test_append_records_provenance: PASSED");

        test_concurrent_appends_serialize(store.clone()).await;
        println!("  test_concurrent_appends_serialize: PASSED");

        // query tests
        test_get_missing(&*store).await;
        println!("  test_get_missing: PASSED");

        test_current_empty_timeline(&*store).await;
        println!("  test_current_empty_timeline: PASSED");

        test_version_at(&*store).await;
        println!("  test_version_at: PASSED");

        test_version_at_before_any_append(&*store).await;
        println!("  test_version_at_before_any_append: PASSED");

        test_history_newest_first(&*store).await;
        println!("  test_history_newest_first: PASSED");

        test_timelines_are_isolated(&*store).await;
        println!("  test_timelines_are_isolated: PASSED");

        test_list_entities(&*store).await;
        println!("  test_list_entities: PASSED");

        test_rejected_append_lists_no_entity(&*store).await;
        println!("  test_rejected_append_lists_no_entity: PASSED");
    };
}
