//! SQLite VersionStore implementation.

use async_trait::async_trait;
use sea_query::{Cond, Expr, Order, Query, SelectStatement, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::model::{EntityRef, NewVersion, Page, TimelineKey, Version, WorldTime};
use crate::storage::helpers::{check_append, format_timestamp, now, parse_timestamp};
use crate::storage::schema::{Versions, CREATE_VERSIONS_TABLE, VERSION_COLUMNS};
use crate::storage::{Result, StorageError, VersionStore};

use super::map_unique_violation;

/// SQLite implementation of VersionStore.
pub struct SqliteVersionStore {
    pool: SqlitePool,
}

impl SqliteVersionStore {
    /// Create a new SQLite version store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the versions table and indexes if they do not exist.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_VERSIONS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Select statement over one timeline.
    fn timeline_query(key: &TimelineKey) -> SelectStatement {
        let mut query = Query::select();
        query
            .columns(VERSION_COLUMNS)
            .from(Versions::Table)
            .and_where(Expr::col(Versions::EntityType).eq(key.entity_type.as_str()))
            .and_where(Expr::col(Versions::EntityId).eq(key.entity_id.as_str()))
            .and_where(Expr::col(Versions::BranchId).eq(key.branch_id.to_string()));
        query
    }

    /// Close the open version and insert the new one within an
    /// already-started transaction.
    async fn append_in_tx(
        conn: &mut SqliteConnection,
        key: &TimelineKey,
        version: NewVersion,
    ) -> Result<Version> {
        let open = {
            let query = Self::timeline_query(key)
                .and_where(Expr::col(Versions::ValidTo).is_null())
                .to_string(SqliteQueryBuilder);
            match sqlx::query(&query).fetch_optional(&mut *conn).await? {
                Some(row) => Some(row_to_version(&row)?),
                None => None,
            }
        };

        let max_version = {
            let query = Query::select()
                .expr(Expr::col(Versions::Version).max())
                .from(Versions::Table)
                .and_where(Expr::col(Versions::EntityType).eq(key.entity_type.as_str()))
                .and_where(Expr::col(Versions::EntityId).eq(key.entity_id.as_str()))
                .and_where(Expr::col(Versions::BranchId).eq(key.branch_id.to_string()))
                .to_string(SqliteQueryBuilder);
            let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
            match row {
                Some(row) => {
                    let max: Option<i64> = row.get(0);
                    max.map(|v| v as u32).unwrap_or(0)
                }
                None => 0,
            }
        };

        let number = check_append(key, open.as_ref(), max_version, &version)?;

        if let Some(open) = &open {
            let query = Query::update()
                .table(Versions::Table)
                .value(Versions::ValidTo, version.valid_from.value())
                .and_where(Expr::col(Versions::Id).eq(open.id.to_string()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&query).execute(&mut *conn).await?;
        }

        let row = Version {
            id: Uuid::new_v4(),
            entity_type: key.entity_type.clone(),
            entity_id: key.entity_id.clone(),
            branch_id: key.branch_id,
            version: number,
            valid_from: version.valid_from,
            valid_to: None,
            payload: version.payload,
            comment: version.comment,
            created_by: version.created_by,
            created_at: now(),
            diverged_from_version_id: version.diverged_from_version_id,
        };

        let query = Query::insert()
            .into_table(Versions::Table)
            .columns(VERSION_COLUMNS)
            .values_panic([
                row.id.to_string().into(),
                row.entity_type.clone().into(),
                row.entity_id.clone().into(),
                row.branch_id.to_string().into(),
                i64::from(row.version).into(),
                row.valid_from.value().into(),
                row.valid_to.map(WorldTime::value).into(),
                row.payload.clone().into(),
                row.comment.clone().into(),
                row.created_by.clone().into(),
                format_timestamp(&row.created_at).into(),
                row.diverged_from_version_id.map(|id| id.to_string()).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_unique_violation(e, || StorageError::WriteConflict(key.clone())))?;

        Ok(row)
    }

    async fn fetch_all(&self, query: &str) -> Result<Vec<Version>> {
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_version).collect()
    }
}

fn row_to_version(row: &SqliteRow) -> Result<Version> {
    let id: String = row.get("id");
    let branch_id: String = row.get("branch_id");
    let version: i64 = row.get("version");
    let valid_from: i64 = row.get("valid_from");
    let valid_to: Option<i64> = row.get("valid_to");
    let created_at: String = row.get("created_at");
    let diverged_from: Option<String> = row.get("diverged_from_version_id");

    Ok(Version {
        id: Uuid::parse_str(&id)?,
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        branch_id: Uuid::parse_str(&branch_id)?,
        version: version as u32,
        valid_from: WorldTime(valid_from),
        valid_to: valid_to.map(WorldTime),
        payload: row.get("payload"),
        comment: row.get("comment"),
        created_by: row.get("created_by"),
        created_at: parse_timestamp(&created_at)?,
        diverged_from_version_id: diverged_from.as_deref().map(Uuid::parse_str).transpose()?,
    })
}

#[async_trait]
impl VersionStore for SqliteVersionStore {
    async fn append(&self, key: &TimelineKey, version: NewVersion) -> Result<Version> {
        // BEGIN IMMEDIATE acquires the write lock upfront, so two appends on the
        // same timeline cannot both read the same open row. The transaction
        // rolls back if dropped before commit.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let row = Self::append_in_tx(&mut *tx, key, version).await?;
        tx.commit().await?;

        debug!(timeline = %key, version = row.version, valid_from = %row.valid_from, "appended version");
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Version>> {
        let query = Query::select()
            .columns(VERSION_COLUMNS)
            .from(Versions::Table)
            .and_where(Expr::col(Versions::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_version).transpose()
    }

    async fn current(&self, key: &TimelineKey) -> Result<Option<Version>> {
        let query = Self::timeline_query(key)
            .and_where(Expr::col(Versions::ValidTo).is_null())
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_version).transpose()
    }

    async fn timeline(&self, key: &TimelineKey) -> Result<Vec<Version>> {
        let query = Self::timeline_query(key)
            .order_by(Versions::ValidFrom, Order::Asc)
            .to_string(SqliteQueryBuilder);
        self.fetch_all(&query).await
    }

    async fn version_at(&self, key: &TimelineKey, at: WorldTime) -> Result<Option<Version>> {
        let query = Self::timeline_query(key)
            .and_where(Expr::col(Versions::ValidFrom).lte(at.value()))
            .cond_where(
                Cond::any()
                    .add(Expr::col(Versions::ValidTo).is_null())
                    .add(Expr::col(Versions::ValidTo).gt(at.value())),
            )
            .order_by(Versions::ValidFrom, Order::Desc)
            .limit(1)
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_version).transpose()
    }

    async fn history(&self, key: &TimelineKey, page: Page) -> Result<Vec<Version>> {
        let sql = {
            let mut query = Self::timeline_query(key);
            query.order_by(Versions::ValidFrom, Order::Desc);
            match page.limit {
                Some(limit) => {
                    query.limit(limit as u64);
                }
                // SQLite only accepts OFFSET after a LIMIT.
                None if page.offset > 0 => {
                    query.limit(i64::MAX as u64);
                }
                None => {}
            }
            if page.offset > 0 {
                query.offset(page.offset as u64);
            }
            query.to_string(SqliteQueryBuilder)
        };
        self.fetch_all(&sql).await
    }

    async fn list_entities(&self, branch_id: Uuid) -> Result<Vec<EntityRef>> {
        let query = Query::select()
            .distinct()
            .columns([Versions::EntityType, Versions::EntityId])
            .from(Versions::Table)
            .and_where(Expr::col(Versions::BranchId).eq(branch_id.to_string()))
            .order_by(Versions::EntityType, Order::Asc)
            .order_by(Versions::EntityId, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| EntityRef::new(row.get::<String, _>("entity_type"), row.get::<String, _>("entity_id")))
            .collect())
    }
}
