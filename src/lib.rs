//! Chronicler - bitemporal branch and version engine
//!
//! Keeps the full history of campaign entities as append-only versions on
//! a tree of branches. Every version is valid over a half-open world-time
//! interval; branches fork from a parent at a cutoff and diverge from there.

pub mod audit;
pub mod clock;
pub mod codec;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod fork;
pub mod guard;
pub mod model;
pub mod repository;
pub mod storage;
pub mod utils;

pub use engine::Chronicle;
pub use error::{Error, Result};
