//! SQL text used against each target.
//!
//! Values always travel as bind parameters. Identifiers that must appear in
//! statement text (registry tables, the VACUUM target) go through
//! [`quote_identifier`].

use crate::config::RegistryConfig;
use crate::maintenance::TableRef;

/// Quote a PostgreSQL identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Schema-qualified, quoted relation name.
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

/// The maintenance statement for one table.
pub fn vacuum_analyze(table: &TableRef) -> String {
    format!(
        "VACUUM (VERBOSE, ANALYZE) {}",
        qualified_name(&table.schema, &table.table)
    )
}

/// Other sessions holding a lock on the relation while actively executing.
///
/// The relation is resolved server-side with `%I` quoting; an unknown
/// relation raises an error, which the lock gate maps to busy.
pub const ACTIVE_LOCKS: &str = "\
SELECT count(*) \
FROM pg_locks l \
JOIN pg_stat_activity a ON l.pid = a.pid \
WHERE l.relation = format('%I.%I', $1::text, $2::text)::regclass \
  AND a.state = 'active' \
  AND a.pid <> pg_backend_pid()";

/// Dead tuples and total relation size from the statistics collector.
pub const TABLE_STATS: &str = "\
SELECT n_dead_tup, pg_total_relation_size(relid) \
FROM pg_stat_user_tables \
WHERE schemaname = $1 AND relname = $2";

/// Statements against the control registry and stats tables.
#[derive(Debug, Clone)]
pub struct RegistrySql {
    pub active_tables: String,
    pub last_processed: String,
    pub touch: String,
    pub insert_stats: String,
}

impl RegistrySql {
    /// Build statements for the configured registry location.
    pub fn new(config: &RegistryConfig) -> Self {
        let control = qualified_name(&config.schema, &config.control_table);
        let stats = qualified_name(&config.schema, &config.stats_table);

        Self {
            active_tables: format!(
                "SELECT table_schema::text, table_name::text FROM {} \
                 WHERE status = 'active' ORDER BY table_schema, table_name",
                control
            ),
            last_processed: format!(
                "SELECT max(last_vacuum)::timestamptz FROM {} \
                 WHERE table_schema = $1 AND table_name = $2",
                control
            ),
            // GREATEST skips NULL, so a first run stamps now().
            touch: format!(
                "UPDATE {} SET last_vacuum = GREATEST(last_vacuum, now()) \
                 WHERE table_schema = $1 AND table_name = $2",
                control
            ),
            insert_stats: format!(
                "INSERT INTO {} (table_schema, table_name, operation, \
                 dead_tuples_before, dead_tuples_after, size_before, size_after) \
                 VALUES ($1::text, $2::text, $3::text, $4::bigint, $5::bigint, \
                 pg_size_pretty($6::bigint), pg_size_pretty($7::bigint))",
                stats
            ),
        }
    }
}
