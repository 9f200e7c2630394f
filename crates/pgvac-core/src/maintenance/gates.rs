//! Eligibility gates evaluated before a table is maintained.
//!
//! The staleness gate runs first; the lock gate is only consulted for tables
//! that are due.

use super::backend::ControlSession;
use super::types::TableRef;
use crate::inventory::TargetDescriptor;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error};

/// How recently a table was processed relative to the freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No `last_vacuum` recorded
    NeverProcessed,
    /// Processed longer ago than the window
    Stale { last_processed_at: DateTime<Utc> },
    /// Processed within the window (or stamped in the future)
    Recent { last_processed_at: DateTime<Utc> },
}

impl Freshness {
    /// Whether the table is due for maintenance.
    pub fn is_eligible(&self) -> bool {
        !matches!(self, Freshness::Recent { .. })
    }
}

/// Skips tables processed within the freshness window.
#[derive(Debug, Clone, Copy)]
pub struct StalenessGate {
    window: Duration,
}

impl StalenessGate {
    /// Create a gate with the given window.
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Classify a `last_vacuum` value at `now`.
    pub fn evaluate(&self, last_processed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Freshness {
        match last_processed_at {
            None => Freshness::NeverProcessed,
            Some(last) if now - last < self.window => Freshness::Recent {
                last_processed_at: last,
            },
            Some(last) => Freshness::Stale {
                last_processed_at: last,
            },
        }
    }

    /// Look up the table in the registry and classify it.
    ///
    /// Lookup failures propagate; they are table-level failures.
    pub async fn check(
        &self,
        session: &mut dyn ControlSession,
        table: &TableRef,
        now: DateTime<Utc>,
    ) -> Result<Freshness> {
        let last = session.last_processed(table).await?;
        let freshness = self.evaluate(last, now);
        debug!(table = %table, ?freshness, "Staleness checked");
        Ok(freshness)
    }
}

impl Default for StalenessGate {
    fn default() -> Self {
        Self::new(Duration::days(1))
    }
}

/// Detects active contention on a table.
///
/// Fails safe: if contention cannot be determined the table is busy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockGate;

impl LockGate {
    /// Whether the table must be skipped because of locks.
    pub async fn is_busy(
        &self,
        session: &mut dyn ControlSession,
        target: &TargetDescriptor,
        table: &TableRef,
    ) -> bool {
        match session.has_active_locks(table).await {
            Ok(locked) => locked,
            Err(e) => {
                error!(
                    database = %target,
                    table = %table,
                    error = %e,
                    "Lock check failed, treating table as busy"
                );
                true
            }
        }
    }
}
