//! pgvac CLI - VACUUM/ANALYZE across a PostgreSQL inventory.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pgvac_core::config::{LogFormat, LoggingConfig};
use pgvac_core::Config;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Exit codes for CLI operations.
///
/// Following Unix conventions:
/// - 0: Success
/// - 1-127: Application errors
#[repr(i32)]
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Configuration error (invalid config file, failed validation)
    ConfigError = 1,
    /// Inventory file could not be read
    InventoryError = 2,
    /// Database error outside per-target isolation
    DatabaseError = 3,
    /// Notification transport could not be built
    NotificationError = 4,
    /// General runtime error
    RuntimeError = 10,
}

impl ExitCode {
    /// Map an error to an exit code by its core error variant.
    fn from_error(error: &anyhow::Error) -> Self {
        let Some(core) = error.downcast_ref::<pgvac_core::Error>() else {
            return if error.downcast_ref::<toml::de::Error>().is_some() {
                ExitCode::ConfigError
            } else {
                ExitCode::RuntimeError
            };
        };

        match core {
            pgvac_core::Error::Config(_) => ExitCode::ConfigError,
            pgvac_core::Error::Inventory(_) => ExitCode::InventoryError,
            pgvac_core::Error::Database(_) => ExitCode::DatabaseError,
            pgvac_core::Error::Notification(_) => ExitCode::NotificationError,
            pgvac_core::Error::Io(_) => ExitCode::RuntimeError,
        }
    }
}

mod commands;

#[derive(Parser)]
#[command(name = "pgvac")]
#[command(about = "VACUUM/ANALYZE maintenance across a PostgreSQL inventory", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run maintenance over every target in the inventory
    Run {
        /// Override the inventory file
        #[arg(long)]
        inventory: Option<PathBuf>,

        /// Evaluate gates only; no VACUUM and no registry writes
        #[arg(long)]
        dry_run: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse the inventory and list its targets
    Inventory {
        /// Override the inventory file
        #[arg(long)]
        inventory: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() {
    let exit_code = run_cli().await;
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    let config = load_config(&cli.config);

    let logging = config
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    let _guard = init_logging(cli.verbose, &logging);

    let result = match config {
        Ok(config) => execute_command(cli.command, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::from_error(&e)
        }
    }
}

/// Initialize console and daily-rotating file logging.
///
/// The returned guard flushes the file writer on drop.
fn init_logging(verbose: u8, logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new(logging.log_level.as_str()),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(logging.file_prefix.as_str())
        .max_log_files(logging.max_log_files)
        .build(&logging.log_dir);

    let (file_writer, guard) = match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Cannot open log directory {}: {}",
                logging.log_dir.display(),
                e
            );
            (None, None)
        }
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    match logging.log_format {
        LogFormat::Json => {
            layers.push(fmt::layer().json().boxed());
            if let Some(writer) = file_writer {
                layers.push(fmt::layer().json().with_writer(writer).boxed());
            }
        }
        LogFormat::Text => {
            layers.push(fmt::layer().boxed());
            if let Some(writer) = file_writer {
                layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
            }
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .init();

    guard
}

/// Execute the CLI command.
async fn execute_command(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Run {
            inventory,
            dry_run,
            json,
        } => {
            commands::run::run(config, inventory, dry_run, json).await?;
        }

        Commands::Inventory { inventory } => {
            commands::inventory::list(config, inventory)?;
        }

        Commands::Validate => {
            config.validate()?;
            println!("Configuration is valid");
            println!("  Inventory: {}", config.inventory.path.display());
            println!(
                "  Freshness window: {} hours",
                config.maintenance.freshness_window_hours
            );
            println!(
                "  Registry: {}.{} / {}.{}",
                config.registry.schema,
                config.registry.control_table,
                config.registry.schema,
                config.registry.stats_table
            );
            println!(
                "  Notifications: {}",
                if config.notification.smtp_enabled() {
                    "smtp"
                } else {
                    "log only"
                }
            );
        }
    }

    Ok(())
}

/// Load configuration, then apply SMTP overrides from the environment.
///
/// A missing default `config.toml` falls back to built-in defaults; an
/// explicit `--config` path must exist.
fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => {
            let default_path = PathBuf::from("config.toml");
            if default_path.exists() {
                read_config(&default_path)?
            } else {
                Config::default()
            }
        }
    };

    config.notification.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        pgvac_core::Error::Config(format!("Cannot read {}: {}", path.display(), e))
    })?;
    let config: Config = toml::from_str(&content).map_err(pgvac_core::Error::from)?;
    Ok(config)
}
