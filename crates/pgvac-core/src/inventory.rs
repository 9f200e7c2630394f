//! Inventory of database targets.
//!
//! The inventory is a line-oriented text file, one target per line:
//!
//! ```text
//! # host,dbname,port,user,password
//! db1.internal,orders,5432,maint,secret
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Malformed records are
//! logged and dropped; they never abort the read.

use crate::error::{InventoryError, InventoryLineError};
use crate::Result;
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, error};

/// Connection descriptor for one database target.
#[derive(Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub host: String,
    pub database_name: String,
    pub port: u16,
    pub user: String,
    password: String,
}

impl TargetDescriptor {
    /// Create a new target descriptor.
    pub fn new(
        host: impl Into<String>,
        database_name: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            database_name: database_name.into(),
            port,
            user: user.into(),
            password: password.into(),
        }
    }

    /// The target's password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Build a tokio-postgres connection config for this target.
    pub fn pg_config(&self, connect_timeout: std::time::Duration) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database_name)
            .user(&self.user)
            .password(&self.password)
            .application_name("pgvac")
            .connect_timeout(connect_timeout);
        config
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.database_name)
    }
}

impl fmt::Debug for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetDescriptor")
            .field("host", &self.host)
            .field("database_name", &self.database_name)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Parse one inventory line.
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(
    line_no: usize,
    line: &str,
) -> std::result::Result<Option<TargetDescriptor>, InventoryLineError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let record = line.trim_end_matches(['\r', '\n']);
    let parts: Vec<&str> = record.split(',').collect();
    if parts.len() != 5 {
        return Err(InventoryLineError::FieldCount {
            line: line_no,
            found: parts.len(),
        });
    }

    let port = match parts[2].trim().parse::<u16>() {
        Ok(port) if port > 0 => port,
        _ => {
            return Err(InventoryLineError::InvalidPort {
                line: line_no,
                value: parts[2].to_string(),
            })
        }
    };

    for (field, value) in [("host", parts[0]), ("dbname", parts[1]), ("user", parts[3])] {
        if value.trim().is_empty() {
            return Err(InventoryLineError::EmptyField {
                line: line_no,
                field,
            });
        }
    }

    // Passwords are taken verbatim; only the line terminator was trimmed.
    Ok(Some(TargetDescriptor::new(
        parts[0].trim(),
        parts[1].trim(),
        port,
        parts[3].trim(),
        parts[4],
    )))
}

/// Parsed inventory: valid targets in file order plus rejected lines.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub targets: Vec<TargetDescriptor>,
    pub errors: Vec<InventoryLineError>,
}

impl Inventory {
    /// Parse inventory text.
    pub fn parse(text: &str) -> Self {
        Self::collect(text.lines().map(|line| Some(line.to_owned())))
    }

    /// Parse inventory from a buffered reader.
    ///
    /// A line that is not valid UTF-8 becomes an
    /// [`InventoryLineError::Encoding`]; only I/O errors fail the read.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Self> {
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        while reader.read_until(b'\n', &mut buf)? > 0 {
            lines.push(String::from_utf8(std::mem::take(&mut buf)).ok());
        }
        Ok(Self::collect(lines))
    }

    /// Read and parse an inventory file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| InventoryError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let inventory = Self::from_reader(std::io::BufReader::new(file))?;
        debug!(
            path = %path.display(),
            targets = inventory.targets.len(),
            invalid = inventory.errors.len(),
            "Inventory loaded"
        );
        Ok(inventory)
    }

    /// `None` marks a line that could not be decoded.
    fn collect<I: IntoIterator<Item = Option<String>>>(lines: I) -> Self {
        let mut inventory = Self::default();
        for (idx, line) in lines.into_iter().enumerate() {
            let line_no = idx + 1;
            let parsed = match line {
                Some(line) => parse_line(line_no, &line),
                None => Err(InventoryLineError::Encoding { line: line_no }),
            };
            match parsed {
                Ok(Some(target)) => inventory.targets.push(target),
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "Invalid inventory line");
                    inventory.errors.push(e);
                }
            }
        }
        inventory
    }

    /// Number of valid targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no valid targets were found.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
