//! Inventory command implementation.

use anyhow::Result;
use pgvac_core::{Config, Inventory};
use std::path::PathBuf;

/// Parse the inventory and list its targets. Passwords are never shown.
pub fn list(config: Config, inventory: Option<PathBuf>) -> Result<()> {
    let path = inventory.unwrap_or(config.inventory.path);
    let inventory = Inventory::from_file(&path)?;

    println!("Inventory: {}", path.display());
    println!("Targets: {}", inventory.len());
    for target in &inventory.targets {
        println!("  - {} (user {})", target, target.user);
    }

    if !inventory.errors.is_empty() {
        println!("\nRejected lines: {}", inventory.errors.len());
        for error in &inventory.errors {
            println!("  - {}", error);
        }
    }

    Ok(())
}
