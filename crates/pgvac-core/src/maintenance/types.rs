//! Value types shared by the gates, the executor and the orchestrators.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A `schema.table` pair identifying one maintenance unit within a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    /// Create a new table reference.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Dead tuple count and on-disk size of a table at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TableStats {
    /// Obsolete row versions awaiting reclamation
    pub dead_tuples: i64,
    /// Total relation size in bytes, including indexes and TOAST
    pub total_size_bytes: i64,
}

/// One row of the append-only maintenance audit log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceStatsRecord {
    pub schema: String,
    pub table: String,
    pub operation_label: String,
    pub dead_tuples_before: i64,
    pub dead_tuples_after: i64,
    pub size_before: i64,
    pub size_after: i64,
    pub recorded_at: DateTime<Utc>,
}

impl MaintenanceStatsRecord {
    /// Build a record from before/after snapshots.
    pub fn new(
        table: &TableRef,
        operation_label: impl Into<String>,
        before: TableStats,
        after: TableStats,
    ) -> Self {
        Self {
            schema: table.schema.clone(),
            table: table.table.clone(),
            operation_label: operation_label.into(),
            dead_tuples_before: before.dead_tuples,
            dead_tuples_after: after.dead_tuples,
            size_before: before.total_size_bytes,
            size_after: after.total_size_bytes,
            recorded_at: Utc::now(),
        }
    }

    /// The table this record belongs to.
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.schema, &self.table)
    }

    /// Dead tuples removed by the run (never negative).
    pub fn dead_tuples_reclaimed(&self) -> i64 {
        (self.dead_tuples_before - self.dead_tuples_after).max(0)
    }
}
