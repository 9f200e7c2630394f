//! pgvac core - multi-database PostgreSQL VACUUM/ANALYZE orchestration
//!
//! Given an inventory of PostgreSQL targets, this library maintains every
//! table listed as active in each target's control registry:
//!
//! - Skips tables processed within the freshness window
//! - Skips tables under active lock contention (fail-safe on query errors)
//! - Runs `VACUUM (VERBOSE, ANALYZE)` on a dedicated autocommit connection
//! - Records before/after statistics and advances `last_vacuum` atomically
//! - Isolates failures per table and per target, and reports one summary

pub mod config;
pub mod error;
pub mod inventory;
pub mod maintenance;
pub mod notify;
pub mod postgres;

// Re-export commonly used types
pub use config::Config;
pub use error::{DatabaseError, InventoryError, InventoryLineError, NotificationError};
pub use error::{Error, Result};
pub use inventory::{Inventory, TargetDescriptor};
pub use maintenance::{DatabaseOutcome, RunOrchestrator, RunOutcome, TableOutcome, TableRef};
