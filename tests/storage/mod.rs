//! Shared storage integration tests.
//!
//! Tests the VersionStore and BranchStore interfaces against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod branch_store_tests;
pub mod version_store_tests;
