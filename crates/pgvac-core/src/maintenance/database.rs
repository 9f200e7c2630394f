//! Per-target maintenance.
//!
//! For one target the orchestrator opens a control connection, reads the
//! active worklist from the registry and processes each table in order:
//!
//! 1. **Staleness gate**: skip tables processed within the window
//! 2. **Lock gate**: skip tables with active contention (fail-safe busy)
//! 3. **Pre-stats**: read dead tuples and size
//! 4. **Execute**: VACUUM on a dedicated autocommit connection
//! 5. **Post-stats + record**: advance `last_vacuum` and append the audit row
//!    in one transaction
//!
//! Every table yields a [`TableOutcome`]. A failed table is rolled back on the
//! control connection and never stops the rest of the worklist.

use super::backend::{ControlSession, MaintenanceBackend};
use super::gates::{Freshness, LockGate, StalenessGate};
use super::types::{MaintenanceStatsRecord, TableRef};
use crate::config::MaintenanceConfig;
use crate::inventory::TargetDescriptor;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of processing one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TableOutcome {
    /// VACUUM ran and the audit record was written
    Processed(MaintenanceStatsRecord),
    /// Processed within the freshness window
    SkippedRecent { last_processed_at: DateTime<Utc> },
    /// Active contention, or contention could not be determined
    SkippedLocked,
    /// Eligible, but the run is a dry run
    Planned,
    /// Any error while processing the table
    Failed { error: String },
}

/// A table and what happened to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableResult {
    pub table: TableRef,
    #[serde(flatten)]
    pub outcome: TableOutcome,
}

/// Per-outcome table counts for a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub processed: usize,
    pub skipped_recent: usize,
    pub skipped_locked: usize,
    pub planned: usize,
    pub failed: usize,
}

/// Report for a target whose control connection was established.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseReport {
    pub target: String,
    pub tables: Vec<TableResult>,
    pub duration_ms: u64,
}

impl DatabaseReport {
    /// Count tables by outcome.
    pub fn counts(&self) -> TableCounts {
        let mut counts = TableCounts::default();
        for result in &self.tables {
            match result.outcome {
                TableOutcome::Processed(_) => counts.processed += 1,
                TableOutcome::SkippedRecent { .. } => counts.skipped_recent += 1,
                TableOutcome::SkippedLocked => counts.skipped_locked += 1,
                TableOutcome::Planned => counts.planned += 1,
                TableOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}

/// Result of processing one target.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DatabaseOutcome {
    /// Worklist exhausted; individual tables may still have failed
    Succeeded(DatabaseReport),
    /// Connection or worklist read failed; no table was attempted
    Failed { target: String, error: String },
}

impl DatabaseOutcome {
    /// Whether the target counts as a success for the run tally.
    pub fn is_success(&self) -> bool {
        matches!(self, DatabaseOutcome::Succeeded(_))
    }

    /// Display form of the target.
    pub fn target(&self) -> &str {
        match self {
            DatabaseOutcome::Succeeded(report) => &report.target,
            DatabaseOutcome::Failed { target, .. } => target,
        }
    }
}

/// Runs the gate/execute/record sequence for every active table of a target.
pub struct DatabaseOrchestrator {
    backend: Arc<dyn MaintenanceBackend>,
    staleness: StalenessGate,
    lock_gate: LockGate,
    operation_label: String,
    dry_run: bool,
}

impl DatabaseOrchestrator {
    /// Create a new orchestrator.
    pub fn new(backend: Arc<dyn MaintenanceBackend>, config: &MaintenanceConfig) -> Self {
        Self {
            backend,
            staleness: StalenessGate::new(config.freshness_window()),
            lock_gate: LockGate,
            operation_label: config.operation_label.clone(),
            dry_run: config.dry_run,
        }
    }

    /// Process one target.
    pub async fn process(&self, target: &TargetDescriptor) -> DatabaseOutcome {
        let start = Instant::now();
        let label = target.to_string();

        let mut session = match self.backend.connect_control(target).await {
            Ok(session) => session,
            Err(e) => {
                error!(database = %label, error = %e, "Database connection failed");
                return DatabaseOutcome::Failed {
                    target: label,
                    error: e.to_string(),
                };
            }
        };
        info!(database = %label, "Connected");

        let worklist = match session.active_tables().await {
            Ok(tables) => tables,
            Err(e) => {
                error!(database = %label, error = %e, "Failed to read active tables");
                if let Err(close_err) = session.close().await {
                    warn!(database = %label, error = %close_err, "Failed to close control connection");
                }
                return DatabaseOutcome::Failed {
                    target: label,
                    error: e.to_string(),
                };
            }
        };
        debug!(database = %label, tables = worklist.len(), "Worklist loaded");

        let mut tables = Vec::with_capacity(worklist.len());
        for table in worklist {
            let outcome = self.process_table(session.as_mut(), target, &table).await;
            tables.push(TableResult { table, outcome });
        }

        if let Err(e) = session.close().await {
            warn!(database = %label, error = %e, "Failed to close control connection");
        }

        let report = DatabaseReport {
            target: label,
            tables,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        let counts = report.counts();
        info!(
            database = %report.target,
            processed = counts.processed,
            skipped_recent = counts.skipped_recent,
            skipped_locked = counts.skipped_locked,
            planned = counts.planned,
            failed = counts.failed,
            duration_ms = report.duration_ms,
            "Database processed"
        );
        DatabaseOutcome::Succeeded(report)
    }

    /// Process one table, turning any error into [`TableOutcome::Failed`].
    async fn process_table(
        &self,
        session: &mut dyn ControlSession,
        target: &TargetDescriptor,
        table: &TableRef,
    ) -> TableOutcome {
        match self.try_process_table(session, target, table).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(database = %target, table = %table, error = %e, "Skipping table due to error");
                if let Err(rollback_err) = session.rollback().await {
                    warn!(
                        database = %target,
                        table = %table,
                        error = %rollback_err,
                        "Rollback on control connection failed"
                    );
                }
                TableOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_process_table(
        &self,
        session: &mut dyn ControlSession,
        target: &TargetDescriptor,
        table: &TableRef,
    ) -> Result<TableOutcome> {
        let freshness = self.staleness.check(session, table, Utc::now()).await?;
        if let Freshness::Recent { last_processed_at } = freshness {
            info!(database = %target, table = %table, %last_processed_at, "Skipping - vacuumed recently");
            return Ok(TableOutcome::SkippedRecent { last_processed_at });
        }

        if self.lock_gate.is_busy(session, target, table).await {
            info!(database = %target, table = %table, "Skipping - locked");
            return Ok(TableOutcome::SkippedLocked);
        }

        if self.dry_run {
            info!(database = %target, table = %table, ?freshness, "Dry run - would vacuum");
            return Ok(TableOutcome::Planned);
        }

        let before = session.table_stats(table).await?;

        info!(database = %target, table = %table, "Vacuuming");
        let start = Instant::now();
        self.backend.vacuum_analyze(target, table).await?;

        let after = session.table_stats(table).await?;
        let record = MaintenanceStatsRecord::new(table, &self.operation_label, before, after);
        session.record_maintenance(&record).await?;

        info!(
            database = %target,
            table = %table,
            dead_tuples_before = record.dead_tuples_before,
            dead_tuples_after = record.dead_tuples_after,
            dead_tuples_reclaimed = record.dead_tuples_reclaimed(),
            size_before = record.size_before,
            size_after = record.size_after,
            duration_ms = start.elapsed().as_millis() as u64,
            "Successfully processed"
        );
        Ok(TableOutcome::Processed(record))
    }
}
