//! SQL-script migrations
//!
//! [`SqlMigration`] covers the common case of a migration that is nothing
//! more than an UP script and a DOWN script.

use async_trait::async_trait;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::backends::DatabaseTransaction;
use crate::error::DatabaseResult;

use super::definitions::Migration;

/// Migration defined by UP and DOWN SQL scripts
#[derive(Debug, Clone)]
pub struct SqlMigration {
    version: String,
    description: String,
    up_sql: String,
    down_sql: String,
}

impl SqlMigration {
    pub fn new(
        version: impl Into<String>,
        description: impl Into<String>,
        up_sql: impl Into<String>,
        down_sql: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            description: description.into(),
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    pub fn down_sql(&self) -> &str {
        &self.down_sql
    }
}

#[async_trait]
impl Migration for SqlMigration {
    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn up(&self, tx: &mut dyn DatabaseTransaction) -> DatabaseResult<()> {
        execute_script(tx, &self.up_sql).await
    }

    async fn down(&self, tx: &mut dyn DatabaseTransaction) -> DatabaseResult<()> {
        execute_script(tx, &self.down_sql).await
    }
}

/// Execute every statement of a script, in order
pub async fn execute_script(tx: &mut dyn DatabaseTransaction, sql: &str) -> DatabaseResult<()> {
    for statement in split_sql_statements(sql) {
        tracing::debug!(statement = statement.as_str(), "Executing statement");
        tx.execute(&statement, &[]).await?;
    }
    Ok(())
}

/// Split SQL statements for execution using proper SQL parsing
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    if sql.trim().is_empty() {
        return Vec::new();
    }

    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed_statements) => parsed_statements
            .into_iter()
            .map(|stmt| format!("{};", stmt))
            .collect(),
        Err(e) => {
            // Dialect-specific syntax the generic parser rejects still runs
            tracing::warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_parsed_statements() {
        let statements = split_sql_statements(
            "CREATE TABLE users (id INT, email VARCHAR(255));\nCREATE INDEX users_email ON users (email);",
        );

        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE users"));
        assert!(statements[1].starts_with("CREATE INDEX users_email"));
        assert!(statements.iter().all(|s| s.ends_with(';')));
    }

    #[test]
    fn test_split_falls_back_on_parse_error() {
        let statements = split_sql_statements("FROBNICATE users; FROBNICATE posts;");
        assert_eq!(statements, vec!["FROBNICATE users;", "FROBNICATE posts;"]);
    }

    #[test]
    fn test_split_empty_script() {
        assert!(split_sql_statements("   \n").is_empty());
    }

    #[test]
    fn test_sql_migration_identity() {
        let migration = SqlMigration::new(
            "2024_01_01_000000",
            "create users table",
            "CREATE TABLE users (id INT)",
            "DROP TABLE users",
        );

        assert_eq!(migration.version(), "2024_01_01_000000");
        assert_eq!(migration.description(), "create users table");
        assert_eq!(migration.down_sql(), "DROP TABLE users");
    }
}
