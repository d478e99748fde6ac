//! Domain repositories.
//!
//! Repositories sit between the engine and the storage traits: they own the
//! payload codec, argument validation and query assembly, while the stores
//! own atomicity.

mod branch;
mod version;

pub use branch::BranchRepository;
pub use version::VersionRepository;
