//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Branches table schema.
#[derive(Iden, Clone, Copy)]
pub enum Branches {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "campaign_id"]
    CampaignId,
    #[iden = "name"]
    Name,
    #[iden = "description"]
    Description,
    #[iden = "parent_id"]
    ParentId,
    #[iden = "diverged_at"]
    DivergedAt,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "deleted_at"]
    DeletedAt,
}

/// Versions table schema.
#[derive(Iden, Clone, Copy)]
pub enum Versions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "entity_type"]
    EntityType,
    #[iden = "entity_id"]
    EntityId,
    #[iden = "branch_id"]
    BranchId,
    #[iden = "version"]
    Version,
    #[iden = "valid_from"]
    ValidFrom,
    #[iden = "valid_to"]
    ValidTo,
    #[iden = "payload"]
    Payload,
    #[iden = "comment"]
    Comment,
    #[iden = "created_by"]
    CreatedBy,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "diverged_from_version_id"]
    DivergedFromVersionId,
}

/// Columns selected when loading a branch row.
pub const BRANCH_COLUMNS: [Branches; 8] = [
    Branches::Id,
    Branches::CampaignId,
    Branches::Name,
    Branches::Description,
    Branches::ParentId,
    Branches::DivergedAt,
    Branches::CreatedAt,
    Branches::DeletedAt,
];

/// Columns selected when loading a version row.
pub const VERSION_COLUMNS: [Versions; 12] = [
    Versions::Id,
    Versions::EntityType,
    Versions::EntityId,
    Versions::BranchId,
    Versions::Version,
    Versions::ValidFrom,
    Versions::ValidTo,
    Versions::Payload,
    Versions::Comment,
    Versions::CreatedBy,
    Versions::CreatedAt,
    Versions::DivergedFromVersionId,
];

/// SQL for creating the branches table.
pub const CREATE_BRANCHES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS branches (
    id TEXT PRIMARY KEY NOT NULL,
    campaign_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    parent_id TEXT REFERENCES branches(id),
    diverged_at INTEGER,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_branches_campaign ON branches(campaign_id);
CREATE INDEX IF NOT EXISTS idx_branches_parent ON branches(parent_id);
"#;

/// SQL for creating the versions table.
///
/// `(entity_type, entity_id, branch_id, valid_from)` is unique so a losing
/// concurrent writer fails instead of corrupting interval contiguity. The
/// partial index allows at most one open row per timeline.
pub const CREATE_VERSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS versions (
    id TEXT PRIMARY KEY NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    branch_id TEXT NOT NULL,
    version INTEGER NOT NULL,
    valid_from INTEGER NOT NULL,
    valid_to INTEGER,
    payload BLOB NOT NULL,
    comment TEXT,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    diverged_from_version_id TEXT,
    UNIQUE (entity_type, entity_id, branch_id, valid_from),
    UNIQUE (entity_type, entity_id, branch_id, version)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_versions_open
    ON versions(entity_type, entity_id, branch_id) WHERE valid_to IS NULL;
CREATE INDEX IF NOT EXISTS idx_versions_branch ON versions(branch_id);
"#;
