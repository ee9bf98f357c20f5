//! Seeder contract and the SQL seeder

use async_trait::async_trait;

use crate::backends::{DatabaseTransaction, DatabaseValue};
use crate::error::DatabaseResult;

/// Seeder trait for implementing database seeders
///
/// The engine does not remember which seeders already ran: running seeders
/// twice runs them twice. A seeder that must not duplicate data has to check
/// for it itself.
#[async_trait]
pub trait Seeder: Send + Sync {
    /// Get the seeder name for logging and dependency references
    fn name(&self) -> &str;

    /// Other seeders that must run first
    fn dependencies(&self) -> Vec<String> {
        vec![]
    }

    /// Run the seeder
    async fn run(&self, tx: &mut dyn DatabaseTransaction) -> DatabaseResult<()>;
}

/// Seeder that executes a fixed list of statements
#[derive(Debug, Clone)]
pub struct SqlSeeder {
    name: String,
    dependencies: Vec<String>,
    statements: Vec<(String, Vec<DatabaseValue>)>,
}

impl SqlSeeder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: vec![],
            statements: vec![],
        }
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Add a statement without parameters
    pub fn statement(self, sql: impl Into<String>) -> Self {
        self.statement_with(sql, vec![])
    }

    /// Add a statement with bound parameters
    pub fn statement_with(mut self, sql: impl Into<String>, params: Vec<DatabaseValue>) -> Self {
        self.statements.push((sql.into(), params));
        self
    }
}

#[async_trait]
impl Seeder for SqlSeeder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn run(&self, tx: &mut dyn DatabaseTransaction) -> DatabaseResult<()> {
        for (sql, params) in &self.statements {
            tx.execute(sql, params).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_seeder_builder() {
        let seeder = SqlSeeder::new("posts")
            .depends_on(["users", "categories"])
            .statement("INSERT INTO posts (title) VALUES ('hello')")
            .statement_with("INSERT INTO posts (title) VALUES ($1)", vec!["world".into()]);

        assert_eq!(seeder.name(), "posts");
        assert_eq!(seeder.dependencies(), vec!["users", "categories"]);
        assert_eq!(seeder.statements.len(), 2);
    }
}
