//! Storage configuration types.

use serde::Deserialize;

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Memory,
    #[default]
    Sqlite,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// SQLite-specific configuration.
    pub sqlite: SqliteConfig,
}

impl StorageConfig {
    /// In-memory storage.
    pub fn memory() -> Self {
        Self {
            storage_type: StorageType::Memory,
            ..Default::default()
        }
    }

    /// SQLite storage at `path`. `":memory:"` opens a private in-memory database.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            sqlite: SqliteConfig {
                path: path.into(),
                ..Default::default()
            },
        }
    }
}

/// SQLite-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file path.
    pub path: String,
    /// Pool size for file-backed databases.
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "data/chronicler.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}
