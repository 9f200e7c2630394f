//! PostgreSQL backend built on tokio-postgres.
//!
//! - One control connection per target ([`PgControlSession`])
//! - One dedicated connection per VACUUM, never inside a transaction block
//! - Identifiers quoted via [`sql::quote_identifier`]

mod control;
pub mod sql;

pub use control::PgControlSession;

use crate::config::{MaintenanceConfig, RegistryConfig};
use crate::error::DatabaseError;
use crate::inventory::TargetDescriptor;
use crate::maintenance::{ControlSession, MaintenanceBackend, TableRef};
use crate::Result;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_postgres::{AsyncMessage, Client, NoTls};
use tracing::{debug, info, warn};

/// Open a connection and spawn its driver task.
///
/// Server notices (such as VACUUM VERBOSE output) are logged at debug level
/// against `context`.
pub(crate) async fn connect(
    target: &TargetDescriptor,
    connect_timeout: Duration,
    context: String,
) -> Result<(Client, JoinHandle<()>)> {
    let (client, mut connection) = target
        .pg_config(connect_timeout)
        .connect(NoTls)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed {
            target: target.to_string(),
            message: e.to_string(),
        })?;

    let driver = tokio::spawn(async move {
        let mut messages = futures::stream::poll_fn(move |cx| connection.poll_message(cx));
        while let Some(message) = messages.next().await {
            match message {
                Ok(AsyncMessage::Notice(notice)) => {
                    debug!(context = %context, severity = %notice.severity(), "{}", notice.message());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(context = %context, error = %e, "Connection closed with error");
                    break;
                }
            }
        }
    });

    Ok((client, driver))
}

/// [`MaintenanceBackend`] for PostgreSQL targets.
#[derive(Debug, Clone)]
pub struct PgBackend {
    registry: RegistryConfig,
    connect_timeout: Duration,
}

impl PgBackend {
    /// Create a backend for the given registry location.
    pub fn new(registry: RegistryConfig, maintenance: &MaintenanceConfig) -> Self {
        Self {
            registry,
            connect_timeout: maintenance.connect_timeout(),
        }
    }
}

#[async_trait]
impl MaintenanceBackend for PgBackend {
    async fn connect_control(&self, target: &TargetDescriptor) -> Result<Box<dyn ControlSession>> {
        let session = PgControlSession::connect(target, &self.registry, self.connect_timeout).await?;
        Ok(Box::new(session))
    }

    async fn vacuum_analyze(&self, target: &TargetDescriptor, table: &TableRef) -> Result<()> {
        // Dedicated connection: no BEGIN is ever sent on it, so every
        // statement commits on its own, which VACUUM requires.
        let (client, driver) =
            connect(target, self.connect_timeout, format!("{} {}", target, table)).await?;

        let statement = sql::vacuum_analyze(table);
        debug!(database = %target, sql = %statement, "Executing");
        let start = Instant::now();
        let result = client.batch_execute(&statement).await;

        drop(client);
        if let Err(e) = driver.await {
            warn!(database = %target, error = %e, "Maintenance connection task failed");
        }

        result.map_err(|e| DatabaseError::Execution {
            table: table.to_string(),
            message: e.to_string(),
        })?;

        info!(
            database = %target,
            table = %table,
            duration_ms = start.elapsed().as_millis() as u64,
            "VACUUM (VERBOSE, ANALYZE) finished"
        );
        Ok(())
    }
}
