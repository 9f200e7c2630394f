//! Whole-inventory run.
//!
//! Reads the inventory, processes every target in file order and sends one
//! notification at the end: a "Completed" summary with the success/failure
//! tally, or a "Failed" critical-failure message when the run itself aborts.

use super::backend::MaintenanceBackend;
use super::database::{DatabaseOrchestrator, DatabaseOutcome};
use crate::config::Config;
use crate::inventory::Inventory;
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Aggregate result of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    /// Inventory lines rejected by the reader
    pub invalid_lines: usize,
    pub databases: Vec<DatabaseOutcome>,
}

impl RunOutcome {
    /// Tally one target's outcome.
    pub fn record(&mut self, outcome: DatabaseOutcome) {
        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.databases.push(outcome);
    }

    /// One-line summary used as the notification body.
    pub fn summary(&self) -> String {
        format!(
            "Processing complete. Success: {}, Failures: {}",
            self.success_count, self.failure_count
        )
    }
}

/// Drives a full run over the configured inventory.
pub struct RunOrchestrator {
    config: Config,
    database: DatabaseOrchestrator,
    notifier: Arc<dyn Notifier>,
}

impl RunOrchestrator {
    /// Create a run orchestrator.
    pub fn new(
        config: Config,
        backend: Arc<dyn MaintenanceBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let database = DatabaseOrchestrator::new(backend, &config.maintenance);
        Self {
            config,
            database,
            notifier,
        }
    }

    /// Run over the inventory file and send the final notification.
    ///
    /// Errors returned here have already been reported with a "Failed"
    /// notification.
    pub async fn run(&self) -> Result<RunOutcome> {
        info!(
            inventory = %self.config.inventory.path.display(),
            dry_run = self.config.maintenance.dry_run,
            "Starting maintenance run"
        );

        match self.execute().await {
            Ok(outcome) => {
                let summary = outcome.summary();
                info!(invalid_lines = outcome.invalid_lines, "{}", summary);
                self.notify(NotificationKind::Completed, summary).await;
                Ok(outcome)
            }
            Err(e) => {
                let message = format!("Critical failure: {}", e);
                error!("{}", message);
                self.notify(NotificationKind::Failed, message).await;
                Err(e)
            }
        }
    }

    async fn execute(&self) -> Result<RunOutcome> {
        let inventory = Inventory::from_file(&self.config.inventory.path)?;
        Ok(self.process_inventory(&inventory).await)
    }

    /// Process already-parsed targets in order. Does not notify.
    pub async fn process_inventory(&self, inventory: &Inventory) -> RunOutcome {
        let mut outcome = RunOutcome {
            invalid_lines: inventory.errors.len(),
            ..Default::default()
        };

        for target in &inventory.targets {
            outcome.record(self.database.process(target).await);
        }
        outcome
    }

    async fn notify(&self, kind: NotificationKind, body: String) {
        let notification =
            Notification::new(kind, &self.config.notification.subject_prefix, body);
        if let Err(e) = self.notifier.send(&notification).await {
            warn!(subject = %notification.subject, error = %e, "Failed to send notification");
        }
    }
}
