//! SQLite implementations of storage interfaces.

mod branch_store;
mod version_store;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::SqliteConfig;
use crate::storage::Result;

pub use branch_store::SqliteBranchStore;
pub use version_store::SqliteVersionStore;

/// Path value selecting a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Open a connection pool for the configured database.
///
/// An in-memory database lives only as long as its connection, so the pool
/// is pinned to one connection that is never recycled.
pub async fn connect(config: &SqliteConfig) -> Result<SqlitePool> {
    let in_memory = config.path == MEMORY_PATH;
    if !in_memory {
        if let Some(parent) = std::path::Path::new(&config.path).parent() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections)
    };

    Ok(pool_options.connect_with(options).await?)
}

/// Map a unique-constraint failure to `conflict`, passing other errors through.
pub(crate) fn map_unique_violation(
    err: sqlx::Error,
    conflict: impl FnOnce() -> crate::storage::StorageError,
) -> crate::storage::StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => conflict(),
        _ => err.into(),
    }
}
