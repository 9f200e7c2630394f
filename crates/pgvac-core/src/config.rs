//! Configuration structures for pgvac.
//!
//! Configuration is loaded from TOML files and can be overridden via CLI flags
//! and, for the SMTP settings, via environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Inventory configuration
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Maintenance behaviour
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Control registry location
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Notification configuration
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Inventory source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InventoryConfig {
    /// Path to the `host,dbname,port,user,password` inventory file
    #[serde(default = "default_inventory_path")]
    pub path: PathBuf,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: default_inventory_path(),
        }
    }
}

/// Upper bound for `freshness_window_hours` (ten years).
pub const MAX_FRESHNESS_WINDOW_HOURS: u64 = 24 * 365 * 10;

/// Maintenance behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaintenanceConfig {
    /// Tables processed within this many hours are skipped
    #[serde(default = "default_freshness_window_hours")]
    pub freshness_window_hours: u64,

    /// Label written to the `operation` column of the stats table
    #[serde(default = "default_operation_label")]
    pub operation_label: String,

    /// Timeout for opening a connection (the VACUUM itself is never timed out)
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    /// Evaluate gates only; never VACUUM or write the registry
    #[serde(default)]
    pub dry_run: bool,
}

impl MaintenanceConfig {
    /// Freshness window as a chrono duration.
    ///
    /// Saturates at the largest representable duration, so an out-of-range
    /// value skips every processed table instead of none.
    pub fn freshness_window(&self) -> chrono::Duration {
        i64::try_from(self.freshness_window_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Connect timeout as a std duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            freshness_window_hours: default_freshness_window_hours(),
            operation_label: default_operation_label(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            dry_run: false,
        }
    }
}

/// Location of the control registry and stats tables inside each target.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Schema holding both tables
    #[serde(default = "default_registry_schema")]
    pub schema: String,

    /// Control table (`table_schema, table_name, status, last_vacuum`)
    #[serde(default = "default_control_table")]
    pub control_table: String,

    /// Append-only stats table
    #[serde(default = "default_stats_table")]
    pub stats_table: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            schema: default_registry_schema(),
            control_table: default_control_table(),
            stats_table: default_stats_table(),
        }
    }
}

/// Notification configuration.
///
/// When `smtp_server` is unset the run summary is only logged.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Subject prefix, e.g. "Vacuum/Analyze" gives "Vacuum/Analyze Completed"
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Sender address
    pub email_from: Option<String>,

    /// Recipient address
    pub email_to: Option<String>,

    /// SMTP relay host
    pub smtp_server: Option<String>,

    /// SMTP port (STARTTLS)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// SMTP username
    pub smtp_user: Option<String>,

    /// SMTP password
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            subject_prefix: default_subject_prefix(),
            email_from: None,
            email_to: None,
            smtp_server: None,
            smtp_port: default_smtp_port(),
            smtp_user: None,
            smtp_password: None,
        }
    }
}

impl NotificationConfig {
    /// Whether enough is configured to deliver mail.
    pub fn smtp_enabled(&self) -> bool {
        self.smtp_server.is_some() && self.email_from.is_some() && self.email_to.is_some()
    }

    /// Override SMTP settings from `EMAIL_FROM`, `EMAIL_TO`, `SMTP_SERVER`,
    /// `SMTP_PORT`, `SMTP_USER` and `SMTP_PASSWORD`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EMAIL_FROM") {
            self.email_from = Some(v);
        }
        if let Some(v) = lookup("EMAIL_TO") {
            self.email_to = Some(v);
        }
        if let Some(v) = lookup("SMTP_SERVER") {
            self.smtp_server = Some(v);
        }
        if let Some(port) = lookup("SMTP_PORT").and_then(|v| v.parse().ok()) {
            self.smtp_port = port;
        }
        if let Some(v) = lookup("SMTP_USER") {
            self.smtp_user = Some(v);
        }
        if let Some(v) = lookup("SMTP_PASSWORD") {
            self.smtp_password = Some(v);
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for the daily rotating log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Log file name prefix
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Number of rotated files to keep
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            file_prefix: default_file_prefix(),
            max_log_files: default_max_log_files(),
            log_level: LogLevel::default(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// Directive string for an `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Plain text format (default)
    #[default]
    Text,
}

// Default value functions
fn default_inventory_path() -> PathBuf {
    PathBuf::from("db_inventory.csv")
}
fn default_freshness_window_hours() -> u64 {
    24
}
fn default_operation_label() -> String {
    "VACUUM ANALYZE".to_string()
}
fn default_connect_timeout_seconds() -> u64 {
    30
}
fn default_registry_schema() -> String {
    "maintenance".to_string()
}
fn default_control_table() -> String {
    "vacuum_control".to_string()
}
fn default_stats_table() -> String {
    "vacuum_stats".to_string()
}
fn default_subject_prefix() -> String {
    "Vacuum/Analyze".to_string()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
fn default_file_prefix() -> String {
    "vacuum_analyze.log".to_string()
}
fn default_max_log_files() -> usize {
    7
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.inventory.path.as_os_str().is_empty() {
            return Err(crate::Error::Config("Inventory path is required".into()));
        }

        let window = self.maintenance.freshness_window_hours;
        if !(1..=MAX_FRESHNESS_WINDOW_HOURS).contains(&window) {
            return Err(crate::Error::Config(format!(
                "freshness_window_hours must be between 1 and {}, got {}",
                MAX_FRESHNESS_WINDOW_HOURS, window
            )));
        }

        if self.maintenance.operation_label.trim().is_empty() {
            return Err(crate::Error::Config("Operation label is required".into()));
        }

        for (name, value) in [
            ("registry schema", &self.registry.schema),
            ("control table", &self.registry.control_table),
            ("stats table", &self.registry.stats_table),
        ] {
            if value.is_empty() {
                return Err(crate::Error::Config(format!("Empty {}", name)));
            }
        }

        let n = &self.notification;
        if n.smtp_server.is_some() && (n.email_from.is_none() || n.email_to.is_none()) {
            return Err(crate::Error::Config(
                "smtp_server requires email_from and email_to".into(),
            ));
        }

        if n.smtp_user.is_some() != n.smtp_password.is_some() {
            tracing::warn!("smtp_user and smtp_password should be set together");
        }

        Ok(())
    }
}
