//! In-memory storage implementations.
//!
//! Each store keeps its rows behind a single `tokio::sync::RwLock`; every
//! mutation runs inside one write-lock critical section, which gives the
//! same serializable behavior the SQL backends get from transactions.

mod branch_store;
mod version_store;

pub use branch_store::MemoryBranchStore;
pub use version_store::MemoryVersionStore;
