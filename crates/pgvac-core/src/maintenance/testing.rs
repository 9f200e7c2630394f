//! In-memory backend for unit tests.

use super::backend::{ControlSession, MaintenanceBackend};
use super::types::{MaintenanceStatsRecord, TableRef, TableStats};
use crate::error::DatabaseError;
use crate::inventory::TargetDescriptor;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(crate) struct FakeTable {
    pub table: TableRef,
    pub last_processed: Option<DateTime<Utc>>,
    pub stats: Option<TableStats>,
    locked: bool,
    lock_query_fails: bool,
    registry_lookup_fails: bool,
    vacuum_fails: bool,
}

impl FakeTable {
    pub fn new(schema: &str, table: &str) -> Self {
        Self {
            table: TableRef::new(schema, table),
            last_processed: None,
            stats: Some(TableStats {
                dead_tuples: 100,
                total_size_bytes: 8192,
            }),
            locked: false,
            lock_query_fails: false,
            registry_lookup_fails: false,
            vacuum_fails: false,
        }
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn lock_query_fails(mut self) -> Self {
        self.lock_query_fails = true;
        self
    }

    pub fn processed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_processed = Some(at);
        self
    }

    pub fn registry_lookup_fails(mut self) -> Self {
        self.registry_lookup_fails = true;
        self
    }

    pub fn vacuum_fails(mut self) -> Self {
        self.vacuum_fails = true;
        self
    }

    pub fn without_stats(mut self) -> Self {
        self.stats = None;
        self
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeDatabase {
    pub tables: Vec<FakeTable>,
    unreachable: bool,
    worklist_fails: bool,
    record_fails: bool,
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub databases: HashMap<String, FakeDatabase>,
    pub connects: Vec<String>,
    pub lock_checks: Vec<TableRef>,
    pub vacuumed: Vec<TableRef>,
    pub records: Vec<MaintenanceStatsRecord>,
    pub rollbacks: usize,
    pub closed: usize,
}

#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(self, name: &str, tables: Vec<FakeTable>) -> Self {
        self.state.lock().databases.insert(
            name.to_string(),
            FakeDatabase {
                tables,
                ..Default::default()
            },
        );
        self
    }

    pub fn unreachable(self, name: &str) -> Self {
        self.state
            .lock()
            .databases
            .entry(name.to_string())
            .or_default()
            .unreachable = true;
        self
    }

    pub fn worklist_fails(self, name: &str) -> Self {
        self.state
            .lock()
            .databases
            .entry(name.to_string())
            .or_default()
            .worklist_fails = true;
        self
    }

    pub fn record_fails(self, name: &str) -> Self {
        self.state
            .lock()
            .databases
            .entry(name.to_string())
            .or_default()
            .record_fails = true;
        self
    }

    pub fn last_processed(&self, db: &str, table: &TableRef) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .databases
            .get(db)
            .and_then(|d| d.tables.iter().find(|t| &t.table == table))
            .and_then(|t| t.last_processed)
    }
}

fn query_error(context: &str) -> crate::Error {
    DatabaseError::query(context, "simulated failure").into()
}

#[async_trait]
impl MaintenanceBackend for FakeBackend {
    async fn connect_control(&self, target: &TargetDescriptor) -> Result<Box<dyn ControlSession>> {
        let mut state = self.state.lock();
        state.connects.push(target.database_name.clone());
        match state.databases.get(&target.database_name) {
            Some(db) if !db.unreachable => Ok(Box::new(FakeSession {
                db: target.database_name.clone(),
                state: Arc::clone(&self.state),
            })),
            _ => Err(DatabaseError::ConnectionFailed {
                target: target.to_string(),
                message: "connection refused".into(),
            }
            .into()),
        }
    }

    async fn vacuum_analyze(&self, target: &TargetDescriptor, table: &TableRef) -> Result<()> {
        let mut state = self.state.lock();
        let fake = state
            .databases
            .get_mut(&target.database_name)
            .and_then(|d| d.tables.iter_mut().find(|t| &t.table == table))
            .ok_or_else(|| query_error("vacuum target lookup"))?;

        if fake.vacuum_fails {
            return Err(DatabaseError::Execution {
                table: table.to_string(),
                message: "canceling statement due to conflict".into(),
            }
            .into());
        }
        if let Some(stats) = fake.stats.as_mut() {
            stats.dead_tuples = 0;
        }
        state.vacuumed.push(table.clone());
        Ok(())
    }
}

struct FakeSession {
    db: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeSession {
    fn with_table<T>(
        &self,
        table: &TableRef,
        f: impl FnOnce(&mut FakeTable) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock();
        let fake = state
            .databases
            .get_mut(&self.db)
            .and_then(|d| d.tables.iter_mut().find(|t| &t.table == table))
            .ok_or_else(|| query_error("table lookup"))?;
        f(fake)
    }
}

#[async_trait]
impl ControlSession for FakeSession {
    async fn active_tables(&mut self) -> Result<Vec<TableRef>> {
        let state = self.state.lock();
        let db = &state.databases[&self.db];
        if db.worklist_fails {
            return Err(query_error("active tables"));
        }
        Ok(db.tables.iter().map(|t| t.table.clone()).collect())
    }

    async fn last_processed(&mut self, table: &TableRef) -> Result<Option<DateTime<Utc>>> {
        self.with_table(table, |t| {
            if t.registry_lookup_fails {
                Err(query_error("last processed"))
            } else {
                Ok(t.last_processed)
            }
        })
    }

    async fn has_active_locks(&mut self, table: &TableRef) -> Result<bool> {
        self.state.lock().lock_checks.push(table.clone());
        self.with_table(table, |t| {
            if t.lock_query_fails {
                Err(query_error("lock check"))
            } else {
                Ok(t.locked)
            }
        })
    }

    async fn table_stats(&mut self, table: &TableRef) -> Result<TableStats> {
        self.with_table(table, |t| {
            t.stats
                .ok_or_else(|| DatabaseError::StatsNotFound(t.table.to_string()).into())
        })
    }

    async fn record_maintenance(&mut self, record: &MaintenanceStatsRecord) -> Result<()> {
        let table = record.table_ref();
        let mut state = self.state.lock();
        let db = state
            .databases
            .get_mut(&self.db)
            .ok_or_else(|| query_error("record"))?;
        if db.record_fails {
            return Err(DatabaseError::RegistryWrite {
                table: table.to_string(),
                message: "simulated failure".into(),
            }
            .into());
        }
        if let Some(fake) = db.tables.iter_mut().find(|t| t.table == table) {
            fake.last_processed = Some(match fake.last_processed {
                Some(prev) if prev > record.recorded_at => prev,
                _ => record.recorded_at,
            });
        }
        state.records.push(record.clone());
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.state.lock().rollbacks += 1;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().closed += 1;
        Ok(())
    }
}
