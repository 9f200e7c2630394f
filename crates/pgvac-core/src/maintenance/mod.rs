//! Table maintenance: gates, execution and orchestration.
//!
//! - **Gates**: staleness (freshness window) and lock contention (fail-safe)
//! - **Backend**: control connection and dedicated VACUUM connection seams
//! - **Database orchestration**: per-target worklist with per-table isolation
//! - **Run orchestration**: whole inventory plus the final notification

mod backend;
mod database;
mod gates;
mod run;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{ControlSession, MaintenanceBackend};
pub use database::{
    DatabaseOrchestrator, DatabaseOutcome, DatabaseReport, TableCounts, TableOutcome, TableResult,
};
pub use gates::{Freshness, LockGate, StalenessGate};
pub use run::{RunOrchestrator, RunOutcome};
pub use types::{MaintenanceStatsRecord, TableRef, TableStats};
