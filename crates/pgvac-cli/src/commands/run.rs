//! Run command implementation.

use anyhow::Result;
use pgvac_core::maintenance::{DatabaseOutcome, RunOrchestrator, RunOutcome};
use pgvac_core::notify::notifier_from_config;
use pgvac_core::postgres::PgBackend;
use pgvac_core::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Run maintenance over the inventory and print the per-target report.
pub async fn run(
    mut config: Config,
    inventory: Option<PathBuf>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    // Apply CLI overrides
    if let Some(path) = inventory {
        config.inventory.path = path;
    }
    if dry_run {
        config.maintenance.dry_run = true;
    }

    info!(
        inventory = %config.inventory.path.display(),
        window_hours = config.maintenance.freshness_window_hours,
        "Starting run"
    );

    let backend = PgBackend::new(config.registry.clone(), &config.maintenance);
    let notifier = notifier_from_config(&config.notification)?;
    let orchestrator = RunOrchestrator::new(config, Arc::new(backend), notifier);

    let outcome = orchestrator.run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_report(&outcome);
    }

    Ok(())
}

fn print_report(outcome: &RunOutcome) {
    for database in &outcome.databases {
        match database {
            DatabaseOutcome::Succeeded(report) => {
                let counts = report.counts();
                println!("{} ({} ms)", report.target, report.duration_ms);
                println!("  Processed:      {}", counts.processed);
                println!("  Skipped recent: {}", counts.skipped_recent);
                println!("  Skipped locked: {}", counts.skipped_locked);
                if counts.planned > 0 {
                    println!("  Planned:        {}", counts.planned);
                }
                println!("  Failed:         {}", counts.failed);
            }
            DatabaseOutcome::Failed { target, error } => {
                println!("{} FAILED: {}", target, error);
            }
        }
    }

    if outcome.invalid_lines > 0 {
        println!("\nInvalid inventory lines: {}", outcome.invalid_lines);
    }
    println!("\n{}", outcome.summary());
}
