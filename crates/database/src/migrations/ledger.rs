//! Migrations ledger
//!
//! The ledger table is the only record of which migrations are applied; the
//! live schema is never inspected. Rows are inserted and deleted inside the
//! same transaction as the migration's own statements.

use crate::backends::{DatabasePool, DatabaseRowExt, DatabaseTransaction, DatabaseValue, SqlDialect};
use crate::config::MigrationConfig;
use crate::error::{DatabaseError, DatabaseResult};

use super::definitions::MigrationRecord;

/// SQL and row mapping for the migrations ledger table
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
    dialect: SqlDialect,
}

impl Ledger {
    pub fn new(config: &MigrationConfig, dialect: SqlDialect) -> Self {
        Self {
            table: config.migrations_table.clone(),
            dialect,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// SQL to create the migrations tracking table
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                {},\n    \
                version VARCHAR(255) NOT NULL UNIQUE,\n    \
                description VARCHAR(255) NOT NULL,\n    \
                applied_at VARCHAR(64) NOT NULL\n\
            )",
            self.table,
            self.dialect.surrogate_key()
        )
    }

    /// SQL to record a migration as applied
    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (version, description, applied_at) VALUES ({}, {}, {})",
            self.table,
            self.dialect.parameter_placeholder(0),
            self.dialect.parameter_placeholder(1),
            self.dialect.parameter_placeholder(2)
        )
    }

    /// SQL to remove a migration record (for rollback)
    pub fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE version = {}",
            self.table,
            self.dialect.parameter_placeholder(0)
        )
    }

    /// SQL to get applied migrations
    pub fn select_sql(&self) -> String {
        format!("SELECT version, description, applied_at FROM {}", self.table)
    }

    /// Ensure the ledger table exists
    pub async fn ensure_table(&self, pool: &dyn DatabasePool) -> DatabaseResult<()> {
        pool.execute(&self.create_table_sql(), &[])
            .await
            .map_err(|e| DatabaseError::Ledger(format!("Failed to create migrations table: {}", e)))?;
        Ok(())
    }

    /// Every ledger row, oldest first
    ///
    /// Rows are ordered by `applied_at`, with `version` breaking ties between
    /// rows stamped with the same instant.
    pub async fn applied(&self, pool: &dyn DatabasePool) -> DatabaseResult<Vec<MigrationRecord>> {
        let rows = pool.fetch_all(&self.select_sql(), &[])
            .await
            .map_err(|e| DatabaseError::Ledger(format!("Failed to query applied migrations: {}", e)))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let read = |column: &str| {
                row.get_string(column).map_err(|e| {
                    DatabaseError::Ledger(format!("Failed to read ledger column '{}': {}", column, e))
                })
            };

            records.push(MigrationRecord {
                version: read("version")?,
                description: read("description")?,
                applied_at: read("applied_at")?,
            });
        }

        records.sort_by(|a, b| {
            a.applied_at
                .cmp(&b.applied_at)
                .then_with(|| a.version.cmp(&b.version))
        });
        Ok(records)
    }

    /// Record a migration as applied
    pub async fn record(&self, tx: &mut dyn DatabaseTransaction, record: &MigrationRecord) -> DatabaseResult<()> {
        let params = [
            DatabaseValue::from(record.version.as_str()),
            DatabaseValue::from(record.description.as_str()),
            DatabaseValue::from(record.applied_at.as_str()),
        ];

        tx.execute(&self.insert_sql(), &params)
            .await
            .map_err(|e| DatabaseError::Ledger(format!("Failed to record migration {}: {}", record.version, e)))?;
        Ok(())
    }

    /// Remove a migration record
    pub async fn remove(&self, tx: &mut dyn DatabaseTransaction, version: &str) -> DatabaseResult<()> {
        let removed = tx.execute(&self.delete_sql(), &[DatabaseValue::from(version)])
            .await
            .map_err(|e| DatabaseError::Ledger(format!("Failed to remove migration record {}: {}", version, e)))?;

        if removed == 0 {
            return Err(DatabaseError::Ledger(format!(
                "Migration record {} was not found in {}",
                version, self.table
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_ledger_sql() {
        let ledger = Ledger::new(&MigrationConfig::default(), SqlDialect::PostgreSQL);

        let create = ledger.create_table_sql();
        assert!(create.contains("CREATE TABLE IF NOT EXISTS elif_migrations"));
        assert!(create.contains("id SERIAL PRIMARY KEY"));
        assert!(create.contains("version VARCHAR(255) NOT NULL UNIQUE"));

        assert_eq!(
            ledger.insert_sql(),
            "INSERT INTO elif_migrations (version, description, applied_at) VALUES ($1, $2, $3)"
        );
        assert_eq!(ledger.delete_sql(), "DELETE FROM elif_migrations WHERE version = $1");
    }

    #[test]
    fn test_mysql_ledger_sql() {
        let config = MigrationConfig::new().migrations_table("schema_versions");
        let ledger = Ledger::new(&config, SqlDialect::MySQL);

        assert!(ledger.create_table_sql().contains("AUTO_INCREMENT"));
        assert_eq!(
            ledger.insert_sql(),
            "INSERT INTO schema_versions (version, description, applied_at) VALUES (?, ?, ?)"
        );
        assert_eq!(ledger.select_sql(), "SELECT version, description, applied_at FROM schema_versions");
    }
}
