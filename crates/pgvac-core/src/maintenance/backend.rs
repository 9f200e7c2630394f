//! Seams between the orchestrators and a database engine.
//!
//! [`MaintenanceBackend`] opens connections for a target; [`ControlSession`]
//! is the single-owner control connection used for registry reads, gate
//! queries, statistics reads and registry writes.

use super::types::{MaintenanceStatsRecord, TableRef, TableStats};
use crate::inventory::TargetDescriptor;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Connection factory and maintenance executor for database targets.
#[async_trait]
pub trait MaintenanceBackend: Send + Sync {
    /// Open the control connection for a target.
    async fn connect_control(&self, target: &TargetDescriptor) -> Result<Box<dyn ControlSession>>;

    /// Run the reclamation and statistics operation for one table.
    ///
    /// Implementations must use a dedicated connection in autocommit mode,
    /// distinct from any control connection, and close it before returning.
    async fn vacuum_analyze(&self, target: &TargetDescriptor, table: &TableRef) -> Result<()>;
}

/// Control connection for one target.
#[async_trait]
pub trait ControlSession: Send {
    /// Tables whose registry status is `active`, in registry query order.
    async fn active_tables(&mut self) -> Result<Vec<TableRef>>;

    /// When the table was last processed, if ever.
    async fn last_processed(&mut self, table: &TableRef) -> Result<Option<DateTime<Utc>>>;

    /// Whether another active session holds a lock on the table.
    ///
    /// Callers go through [`super::LockGate`], which maps errors to busy.
    async fn has_active_locks(&mut self, table: &TableRef) -> Result<bool>;

    /// Current dead tuple count and total size.
    async fn table_stats(&mut self, table: &TableRef) -> Result<TableStats>;

    /// Advance `last_vacuum` and append the audit record in one transaction.
    async fn record_maintenance(&mut self, record: &MaintenanceStatsRecord) -> Result<()>;

    /// Roll back any transaction left open on the connection.
    async fn rollback(&mut self) -> Result<()>;

    /// Close the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}
