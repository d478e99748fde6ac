use super::*;
use crate::model::WorldTime;
use crate::storage::MemoryBranchStore;

fn repo() -> BranchRepository {
    BranchRepository::new(Arc::new(MemoryBranchStore::new()))
}

#[tokio::test]
async fn test_create_root_branch() {
    let repo = repo();
    let main = repo
        .create(NewBranch::root("camp-1", "main").with_description("canon"))
        .await
        .unwrap();

    assert!(main.is_root());
    assert!(main.diverged_at.is_none());
    assert_eq!(main.description.as_deref(), Some("canon"));
    assert_eq!(repo.require(main.id).await.unwrap(), main);
}

#[tokio::test]
async fn test_create_rejects_empty_name() {
    let err = repo().create(NewBranch::root("camp-1", "  ")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidBranch(_)));
}

#[tokio::test]
async fn test_create_requires_parent_and_divergence_together() {
    let repo = repo();
    let main = repo.create(NewBranch::root("camp-1", "main")).await.unwrap();

    let mut orphan = NewBranch::root("camp-1", "alt");
    orphan.parent_id = Some(main.id);
    assert!(matches!(repo.create(orphan).await, Err(Error::InvalidBranch(_))));

    let mut timeless = NewBranch::root("camp-1", "alt");
    timeless.diverged_at = Some(WorldTime(3));
    assert!(matches!(repo.create(timeless).await, Err(Error::InvalidBranch(_))));
}

#[tokio::test]
async fn test_create_rejects_unknown_or_foreign_parent() {
    let repo = repo();
    let other = repo.create(NewBranch::root("camp-2", "main")).await.unwrap();

    let missing = NewBranch::child("camp-1", "alt", Uuid::new_v4(), WorldTime(1));
    assert!(matches!(repo.create(missing).await, Err(Error::InvalidBranch(_))));

    let foreign = NewBranch::child("camp-1", "alt", other.id, WorldTime(1));
    assert!(matches!(repo.create(foreign).await, Err(Error::InvalidBranch(_))));
}

#[tokio::test]
async fn test_soft_delete_blocked_by_live_child() {
    let repo = repo();
    let main = repo.create(NewBranch::root("camp-1", "main")).await.unwrap();
    let alt = repo
        .create(NewBranch::child("camp-1", "alt", main.id, WorldTime(5)))
        .await
        .unwrap();

    let err = repo.soft_delete(main.id).await.unwrap_err();
    assert!(matches!(err, Error::HasChildren { children: 1, .. }));

    let deleted = repo.soft_delete(alt.id).await.unwrap();
    assert!(deleted.is_deleted());
    assert!(repo.find_by_id(alt.id).await.unwrap().is_none());

    repo.soft_delete(main.id).await.unwrap();
    let err = repo.soft_delete(main.id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_under_deleted_parent_fails() {
    let repo = repo();
    let main = repo.create(NewBranch::root("camp-1", "main")).await.unwrap();
    repo.soft_delete(main.id).await.unwrap();

    let child = NewBranch::child("camp-1", "alt", main.id, WorldTime(1));
    assert!(matches!(repo.create(child).await, Err(Error::InvalidBranch(_))));
}

#[tokio::test]
async fn test_hierarchy_nests_children_in_creation_order() {
    let repo = repo();
    let main = repo.create(NewBranch::root("camp-1", "main")).await.unwrap();
    let a = repo
        .create(NewBranch::child("camp-1", "a", main.id, WorldTime(1)))
        .await
        .unwrap();
    let b = repo
        .create(NewBranch::child("camp-1", "b", main.id, WorldTime(2)))
        .await
        .unwrap();
    let a1 = repo
        .create(NewBranch::child("camp-1", "a1", a.id, WorldTime(3)))
        .await
        .unwrap();
    repo.create(NewBranch::root("camp-2", "elsewhere")).await.unwrap();

    let forest = repo.get_hierarchy("camp-1").await.unwrap();
    assert_eq!(forest.len(), 1);

    let root = &forest[0];
    assert_eq!(root.branch.id, main.id);
    assert_eq!(root.subtree_size(), 4);

    let child_ids: Vec<Uuid> = root.children.iter().map(|n| n.branch.id).collect();
    let mut expected = vec![a.clone(), b.clone()];
    expected.sort_by(|x, y| x.created_at.cmp(&y.created_at).then(x.id.cmp(&y.id)));
    assert_eq!(child_ids, expected.iter().map(|b| b.id).collect::<Vec<_>>());

    let a_node = root.children.iter().find(|n| n.branch.id == a.id).unwrap();
    assert_eq!(a_node.children[0].branch.id, a1.id);
}

#[tokio::test]
async fn test_hierarchy_skips_deleted_branches() {
    let repo = repo();
    let main = repo.create(NewBranch::root("camp-1", "main")).await.unwrap();
    let alt = repo
        .create(NewBranch::child("camp-1", "alt", main.id, WorldTime(1)))
        .await
        .unwrap();
    repo.soft_delete(alt.id).await.unwrap();

    let forest = repo.get_hierarchy("camp-1").await.unwrap();
    assert_eq!(forest.len(), 1);
    assert!(forest[0].children.is_empty());
    assert!(repo.get_hierarchy("camp-9").await.unwrap().is_empty());
}
