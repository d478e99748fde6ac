//! SQLite BranchStore implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Expr, Order, Query, SelectStatement, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::model::{Branch, WorldTime};
use crate::storage::helpers::{format_timestamp, parse_timestamp};
use crate::storage::schema::{Branches, BRANCH_COLUMNS, CREATE_BRANCHES_TABLE};
use crate::storage::{BranchStore, Result, StorageError};

use super::map_unique_violation;

/// SQLite implementation of BranchStore.
pub struct SqliteBranchStore {
    pool: SqlitePool,
}

impl SqliteBranchStore {
    /// Create a new SQLite branch store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the branches table and indexes if they do not exist.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_BRANCHES_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn live_query() -> SelectStatement {
        let mut query = Query::select();
        query
            .columns(BRANCH_COLUMNS)
            .from(Branches::Table)
            .and_where(Expr::col(Branches::DeletedAt).is_null())
            .order_by(Branches::CreatedAt, Order::Asc)
            .order_by(Branches::Id, Order::Asc);
        query
    }

    async fn fetch_all(&self, query: &str) -> Result<Vec<Branch>> {
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_branch).collect()
    }

    async fn mark_deleted_in_tx(
        conn: &mut SqliteConnection,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Branch> {
        let query = Query::select()
            .columns(BRANCH_COLUMNS)
            .from(Branches::Table)
            .and_where(Expr::col(Branches::Id).eq(id.to_string()))
            .and_where(Expr::col(Branches::DeletedAt).is_null())
            .to_string(SqliteQueryBuilder);
        let mut branch = match sqlx::query(&query).fetch_optional(&mut *conn).await? {
            Some(row) => row_to_branch(&row)?,
            None => return Err(StorageError::BranchNotFound(id)),
        };

        let query = Query::select()
            .expr(Expr::col(Branches::Id).count())
            .from(Branches::Table)
            .and_where(Expr::col(Branches::ParentId).eq(id.to_string()))
            .and_where(Expr::col(Branches::DeletedAt).is_null())
            .to_string(SqliteQueryBuilder);
        let children: i64 = sqlx::query(&query).fetch_one(&mut *conn).await?.get(0);
        if children > 0 {
            return Err(StorageError::HasChildren {
                branch_id: id,
                children: children as usize,
            });
        }

        let query = Query::update()
            .table(Branches::Table)
            .value(Branches::DeletedAt, format_timestamp(&at))
            .and_where(Expr::col(Branches::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *conn).await?;

        branch.deleted_at = Some(at);
        Ok(branch)
    }
}

fn row_to_branch(row: &SqliteRow) -> Result<Branch> {
    let id: String = row.get("id");
    let parent_id: Option<String> = row.get("parent_id");
    let diverged_at: Option<i64> = row.get("diverged_at");
    let created_at: String = row.get("created_at");
    let deleted_at: Option<String> = row.get("deleted_at");

    Ok(Branch {
        id: Uuid::parse_str(&id)?,
        campaign_id: row.get("campaign_id"),
        name: row.get("name"),
        description: row.get("description"),
        parent_id: parent_id.as_deref().map(Uuid::parse_str).transpose()?,
        diverged_at: diverged_at.map(WorldTime),
        created_at: parse_timestamp(&created_at)?,
        deleted_at: deleted_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

#[async_trait]
impl BranchStore for SqliteBranchStore {
    async fn insert(&self, branch: &Branch) -> Result<()> {
        let query = Query::insert()
            .into_table(Branches::Table)
            .columns(BRANCH_COLUMNS)
            .values_panic([
                branch.id.to_string().into(),
                branch.campaign_id.clone().into(),
                branch.name.clone().into(),
                branch.description.clone().into(),
                branch.parent_id.map(|id| id.to_string()).into(),
                branch.diverged_at.map(WorldTime::value).into(),
                format_timestamp(&branch.created_at).into(),
                branch.deleted_at.as_ref().map(format_timestamp).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || StorageError::DuplicateBranch(branch.id)))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Branch>> {
        let query = Query::select()
            .columns(BRANCH_COLUMNS)
            .from(Branches::Table)
            .and_where(Expr::col(Branches::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_branch).transpose()
    }

    async fn list_by_campaign(&self, campaign_id: &str) -> Result<Vec<Branch>> {
        let query = Self::live_query()
            .and_where(Expr::col(Branches::CampaignId).eq(campaign_id))
            .to_string(SqliteQueryBuilder);
        self.fetch_all(&query).await
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<Branch>> {
        let query = Self::live_query()
            .and_where(Expr::col(Branches::ParentId).eq(parent_id.to_string()))
            .to_string(SqliteQueryBuilder);
        self.fetch_all(&query).await
    }

    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> Result<Branch> {
        // The child count and the update must see the same snapshot.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let branch = Self::mark_deleted_in_tx(&mut *tx, id, at).await?;
        tx.commit().await?;
        Ok(branch)
    }
}
