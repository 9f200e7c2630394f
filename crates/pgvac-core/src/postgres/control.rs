//! Control connection for one target.

use super::sql::{self, RegistrySql};
use crate::config::RegistryConfig;
use crate::error::DatabaseError;
use crate::inventory::TargetDescriptor;
use crate::maintenance::{ControlSession, MaintenanceStatsRecord, TableRef, TableStats};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::Client;
use tracing::{debug, warn};

/// Single-owner control connection.
///
/// Gate and statistics reads run in autocommit at READ COMMITTED; each
/// registry write runs in its own short transaction.
pub struct PgControlSession {
    client: Client,
    driver: JoinHandle<()>,
    target: String,
    statements: RegistrySql,
}

impl PgControlSession {
    /// Connect to a target.
    pub async fn connect(
        target: &TargetDescriptor,
        registry: &RegistryConfig,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let (client, driver) =
            super::connect(target, connect_timeout, format!("{} control", target)).await?;
        Ok(Self {
            client,
            driver,
            target: target.to_string(),
            statements: RegistrySql::new(registry),
        })
    }
}

#[async_trait]
impl ControlSession for PgControlSession {
    async fn active_tables(&mut self) -> Result<Vec<TableRef>> {
        let rows = self
            .client
            .query(self.statements.active_tables.as_str(), &[])
            .await
            .map_err(|e| DatabaseError::query("active tables", e))?;

        rows.iter()
            .map(|row| {
                let schema: String = row.try_get(0)?;
                let table: String = row.try_get(1)?;
                Ok::<_, tokio_postgres::Error>(TableRef::new(schema, table))
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::query("active tables", e).into())
    }

    async fn last_processed(&mut self, table: &TableRef) -> Result<Option<DateTime<Utc>>> {
        let row = self
            .client
            .query_one(
                self.statements.last_processed.as_str(),
                &[&table.schema, &table.table],
            )
            .await
            .map_err(|e| DatabaseError::query(format!("last vacuum of {}", table), e))?;

        row.try_get::<_, Option<DateTime<Utc>>>(0)
            .map_err(|e| DatabaseError::query(format!("last vacuum of {}", table), e).into())
    }

    async fn has_active_locks(&mut self, table: &TableRef) -> Result<bool> {
        let row = self
            .client
            .query_one(sql::ACTIVE_LOCKS, &[&table.schema, &table.table])
            .await
            .map_err(|e| DatabaseError::query(format!("lock check on {}", table), e))?;

        let count: i64 = row
            .try_get(0)
            .map_err(|e| DatabaseError::query(format!("lock check on {}", table), e))?;
        debug!(database = %self.target, table = %table, locks = count, "Lock check");
        Ok(count > 0)
    }

    async fn table_stats(&mut self, table: &TableRef) -> Result<TableStats> {
        let row = self
            .client
            .query_opt(sql::TABLE_STATS, &[&table.schema, &table.table])
            .await
            .map_err(|e| DatabaseError::query(format!("stats of {}", table), e))?
            .ok_or_else(|| DatabaseError::StatsNotFound(table.to_string()))?;

        let context = || format!("stats of {}", table);
        Ok(TableStats {
            dead_tuples: row
                .try_get(0)
                .map_err(|e| DatabaseError::query(context(), e))?,
            total_size_bytes: row
                .try_get(1)
                .map_err(|e| DatabaseError::query(context(), e))?,
        })
    }

    async fn record_maintenance(&mut self, record: &MaintenanceStatsRecord) -> Result<()> {
        let table = record.table_ref().to_string();
        let write_err = |e: tokio_postgres::Error| DatabaseError::RegistryWrite {
            table: table.clone(),
            message: e.to_string(),
        };

        let tx = self.client.transaction().await.map_err(write_err)?;

        let updated = tx
            .execute(
                self.statements.touch.as_str(),
                &[&record.schema, &record.table],
            )
            .await
            .map_err(write_err)?;
        if updated == 0 {
            warn!(database = %self.target, table = %table, "No registry row to update");
        }

        tx.execute(
            self.statements.insert_stats.as_str(),
            &[
                &record.schema,
                &record.table,
                &record.operation_label,
                &record.dead_tuples_before,
                &record.dead_tuples_after,
                &record.size_before,
                &record.size_after,
            ],
        )
        .await
        .map_err(write_err)?;

        tx.commit().await.map_err(write_err)?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        // Outside a transaction block the server only warns.
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| DatabaseError::query("rollback", e))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let Self { client, driver, target, .. } = *self;
        drop(client);
        if let Err(e) = driver.await {
            warn!(database = %target, error = %e, "Control connection task failed");
        }
        debug!(database = %target, "Control connection closed");
        Ok(())
    }
}
