//! In-memory BranchStore implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::Branch;
use crate::storage::{BranchStore, Result, StorageError};

/// Branch store that keeps every branch row in memory.
#[derive(Default)]
pub struct MemoryBranchStore {
    branches: RwLock<HashMap<Uuid, Branch>>,
}

impl MemoryBranchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut branches: Vec<Branch>) -> Vec<Branch> {
    branches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    branches
}

#[async_trait]
impl BranchStore for MemoryBranchStore {
    async fn insert(&self, branch: &Branch) -> Result<()> {
        let mut branches = self.branches.write().await;
        if branches.contains_key(&branch.id) {
            return Err(StorageError::DuplicateBranch(branch.id));
        }
        branches.insert(branch.id, branch.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Branch>> {
        Ok(self.branches.read().await.get(&id).cloned())
    }

    async fn list_by_campaign(&self, campaign_id: &str) -> Result<Vec<Branch>> {
        let branches = self.branches.read().await;
        Ok(sorted(
            branches
                .values()
                .filter(|b| b.campaign_id == campaign_id && !b.is_deleted())
                .cloned()
                .collect(),
        ))
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<Branch>> {
        let branches = self.branches.read().await;
        Ok(sorted(
            branches
                .values()
                .filter(|b| b.parent_id == Some(parent_id) && !b.is_deleted())
                .cloned()
                .collect(),
        ))
    }

    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> Result<Branch> {
        let mut branches = self.branches.write().await;

        let children = branches
            .values()
            .filter(|b| b.parent_id == Some(id) && !b.is_deleted())
            .count();

        let branch = branches
            .get_mut(&id)
            .filter(|b| !b.is_deleted())
            .ok_or(StorageError::BranchNotFound(id))?;

        if children > 0 {
            return Err(StorageError::HasChildren {
                branch_id: id,
                children,
            });
        }

        branch.deleted_at = Some(at);
        Ok(branch.clone())
    }
}
