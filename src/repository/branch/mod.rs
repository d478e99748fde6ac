//! Branch repository.
//!
//! Validates branch creation and assembles the branch tree of a campaign.
//! Parent links are immutable and point at branches that existed first, so
//! the tree can never contain a cycle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Branch, BranchNode, NewBranch};
use crate::storage::helpers::now;
use crate::storage::BranchStore;

/// Repository for branch rows.
#[derive(Clone)]
pub struct BranchRepository {
    store: Arc<dyn BranchStore>,
}

impl BranchRepository {
    pub fn new(store: Arc<dyn BranchStore>) -> Self {
        Self { store }
    }

    /// Create a branch.
    ///
    /// `parent_id` and `diverged_at` must be given together. A parent must
    /// be live and belong to the same campaign.
    pub async fn create(&self, new: NewBranch) -> Result<Branch> {
        if new.name.trim().is_empty() {
            return Err(Error::InvalidBranch("name must not be empty".to_string()));
        }

        match (new.parent_id, new.diverged_at) {
            (Some(parent_id), Some(_)) => {
                let parent = self
                    .find_by_id(parent_id)
                    .await?
                    .ok_or_else(|| Error::InvalidBranch(format!("parent {parent_id} not found")))?;
                if parent.campaign_id != new.campaign_id {
                    return Err(Error::InvalidBranch(format!(
                        "parent {parent_id} belongs to campaign {}",
                        parent.campaign_id
                    )));
                }
            }
            (None, None) => {}
            _ => {
                return Err(Error::InvalidBranch(
                    "parent_id and diverged_at must be set together".to_string(),
                ))
            }
        }

        let branch = Branch {
            id: Uuid::new_v4(),
            campaign_id: new.campaign_id,
            name: new.name,
            description: new.description,
            parent_id: new.parent_id,
            diverged_at: new.diverged_at,
            created_at: now(),
            deleted_at: None,
        };
        self.store.insert(&branch).await?;

        info!(
            branch_id = %branch.id,
            campaign_id = %branch.campaign_id,
            parent_id = ?branch.parent_id,
            name = %branch.name,
            "created branch"
        );
        Ok(branch)
    }

    /// Soft-delete a branch. Fails while any live child references it.
    pub async fn soft_delete(&self, id: Uuid) -> Result<Branch> {
        let branch = self.store.mark_deleted(id, now()).await?;
        info!(branch_id = %id, "deleted branch");
        Ok(branch)
    }

    /// A live branch by id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Branch>> {
        Ok(self.store.get(id).await?.filter(|b| !b.is_deleted()))
    }

    /// A live branch by id, or `NotFound`.
    pub async fn require(&self, id: Uuid) -> Result<Branch> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::branch_not_found(id))
    }

    /// Live branches of a campaign in creation order.
    pub async fn find_by_campaign(&self, campaign_id: &str) -> Result<Vec<Branch>> {
        Ok(self.store.list_by_campaign(campaign_id).await?)
    }

    /// Live direct children of a branch.
    pub async fn children(&self, id: Uuid) -> Result<Vec<Branch>> {
        Ok(self.store.list_children(id).await?)
    }

    /// Live branches of a campaign arranged as a forest.
    ///
    /// Roots are branches with no live parent in the campaign. Siblings keep
    /// creation order.
    pub async fn get_hierarchy(&self, campaign_id: &str) -> Result<Vec<BranchNode>> {
        let branches = self.find_by_campaign(campaign_id).await?;
        let live: HashSet<Uuid> = branches.iter().map(|b| b.id).collect();

        let mut roots = Vec::new();
        let mut by_parent: HashMap<Uuid, Vec<Branch>> = HashMap::new();
        for branch in branches {
            match branch.parent_id {
                Some(parent) if live.contains(&parent) => {
                    by_parent.entry(parent).or_default().push(branch)
                }
                _ => roots.push(branch),
            }
        }

        Ok(roots
            .into_iter()
            .map(|root| build_node(root, &mut by_parent))
            .collect())
    }
}

fn build_node(branch: Branch, by_parent: &mut HashMap<Uuid, Vec<Branch>>) -> BranchNode {
    let children = by_parent
        .remove(&branch.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| build_node(child, by_parent))
        .collect();
    BranchNode { branch, children }
}

#[cfg(test)]
mod tests;
