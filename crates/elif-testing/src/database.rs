//! Database testing utilities
//!
//! [`TestDatabase`] is a private in-memory SQLite database exposed through
//! the engine's [`DatabasePool`] trait. Every statement the engine sends
//! passes through a thin layer that can fail it on demand and journals what
//! ran and what committed. The inspection helpers read the database directly,
//! bypassing both.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use regex::Regex;

use elif_database::backends::{
    DatabasePool, DatabaseRow, DatabaseRowExt, DatabaseTransaction, DatabaseValue, SqlDialect,
    SqlitePool,
};
use elif_database::error::{DatabaseError, DatabaseResult};

use crate::TestResult;

#[derive(Default)]
struct State {
    failing: Vec<Regex>,
    fail_begins: bool,
    fail_commits: bool,
    executed: Vec<String>,
    committed: Vec<String>,
    commits: usize,
    rollbacks: usize,
}

impl State {
    fn check(&self, sql: &str) -> DatabaseResult<()> {
        if self.failing.iter().any(|re| re.is_match(sql)) {
            return Err(DatabaseError::Query(format!("injected failure: {}", sql.trim())));
        }
        Ok(())
    }
}

/// Test database manager over a fresh in-memory SQLite database
///
/// Clones share the same database and journals.
#[derive(Clone)]
pub struct TestDatabase {
    pool: SqlitePool,
    state: Arc<Mutex<State>>,
}

impl TestDatabase {
    /// Create a new, empty test database
    pub async fn new() -> TestResult<Self> {
        Ok(Self {
            pool: SqlitePool::in_memory().await?,
            state: Arc::new(Mutex::new(State::default())),
        })
    }

    /// This database as the pool handle the engine expects
    pub fn pool(&self) -> Arc<dyn DatabasePool> {
        Arc::new(self.clone())
    }

    /// Fail every later statement matching `pattern` (case-insensitive)
    pub fn fail_statements_matching(&self, pattern: &str) -> TestResult<()> {
        let regex = Regex::new(&format!("(?i){}", pattern))?;
        self.lock().failing.push(regex);
        Ok(())
    }

    /// Make every `begin_transaction` fail until turned off
    pub fn fail_begins(&self, fail: bool) {
        self.lock().fail_begins = fail;
    }

    /// Make every commit fail, rolling the transaction back, until turned off
    pub fn fail_commits(&self, fail: bool) {
        self.lock().fail_commits = fail;
    }

    /// Remove every injected failure
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing.clear();
        state.fail_begins = false;
        state.fail_commits = false;
    }

    /// Statements that executed successfully, committed or not
    pub fn executed_statements(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Statements whose effects are visible: autocommitted or committed
    pub fn committed_statements(&self) -> Vec<String> {
        self.lock().committed.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    pub fn rollback_count(&self) -> usize {
        self.lock().rollbacks
    }

    pub async fn table_exists(&self, table: &str) -> TestResult<bool> {
        let rows = self
            .pool
            .fetch_all(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                &[DatabaseValue::from(table)],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Table names, sorted
    pub async fn tables(&self) -> TestResult<Vec<String>> {
        let rows = self
            .pool
            .fetch_all(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                &[],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| row.get_string("name"))
            .collect::<DatabaseResult<_>>()?)
    }

    /// Rows of a table in insertion order, as column → value maps
    pub async fn rows(&self, table: &str) -> TestResult<Vec<HashMap<String, DatabaseValue>>> {
        let rows = self
            .pool
            .fetch_all(&format!("SELECT * FROM {} ORDER BY rowid", table), &[])
            .await?;
        Ok(rows
            .iter()
            .map(|row| row.to_map())
            .collect::<DatabaseResult<_>>()?)
    }

    /// Row count of a table, 0 if it does not exist
    pub async fn count(&self, table: &str) -> TestResult<usize> {
        if !self.table_exists(table).await? {
            return Ok(0);
        }
        let rows = self
            .pool
            .fetch_all(&format!("SELECT COUNT(*) AS n FROM {}", table), &[])
            .await?;
        match rows.first().map(|row| row.get_by_name("n")).transpose()? {
            Some(DatabaseValue::Int64(n)) => Ok(usize::try_from(n).unwrap_or_default()),
            _ => Ok(0),
        }
    }

    /// One column of every row in insertion order, rendered as strings
    pub async fn column_values(&self, table: &str, column: &str) -> TestResult<Vec<String>> {
        Ok(self
            .rows(table)
            .await?
            .into_iter()
            .filter_map(|row| {
                row.get(column).map(|value| match value {
                    DatabaseValue::String(s) => s.clone(),
                    other => other.to_json().to_string(),
                })
            })
            .collect())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }
}

#[async_trait]
impl DatabasePool for TestDatabase {
    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>> {
        let fail = self.lock().fail_begins;
        if fail {
            return Err(DatabaseError::Transaction("injected begin failure".to_string()));
        }
        let inner = self.pool.begin_transaction().await?;
        Ok(Box::new(TestTransaction {
            inner,
            state: Arc::clone(&self.state),
            statements: Vec::new(),
        }))
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        self.lock().check(sql)?;
        let affected = self.pool.execute(sql, params).await?;
        journal_autocommit(&self.state, sql);
        Ok(affected)
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>> {
        self.lock().check(sql)?;
        let rows = self.pool.fetch_all(sql, params).await?;
        journal_autocommit(&self.state, sql);
        Ok(rows)
    }

    fn sql_dialect(&self) -> SqlDialect {
        self.pool.sql_dialect()
    }
}

/// Transaction that journals its statements and honours injected failures
pub struct TestTransaction {
    inner: Box<dyn DatabaseTransaction>,
    state: Arc<Mutex<State>>,
    statements: Vec<String>,
}

impl TestTransaction {
    fn before(&self, sql: &str) -> DatabaseResult<()> {
        lock(&self.state).check(sql)
    }

    fn after(&mut self, sql: &str) {
        lock(&self.state).executed.push(sql.to_string());
        self.statements.push(sql.to_string());
    }
}

#[async_trait]
impl DatabaseTransaction for TestTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        self.before(sql)?;
        let affected = self.inner.execute(sql, params).await?;
        self.after(sql);
        Ok(affected)
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>> {
        self.before(sql)?;
        let rows = self.inner.fetch_all(sql, params).await?;
        self.after(sql);
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> DatabaseResult<()> {
        let TestTransaction { inner, state: shared, statements } = *self;

        let fail = lock(&shared).fail_commits;
        if fail {
            inner.rollback().await?;
            lock(&shared).rollbacks += 1;
            return Err(DatabaseError::Transaction("injected commit failure".to_string()));
        }

        inner.commit().await?;
        let mut state = lock(&shared);
        state.committed.extend(statements);
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DatabaseResult<()> {
        let TestTransaction { inner, state, .. } = *self;
        inner.rollback().await?;
        lock(&state).rollbacks += 1;
        Ok(())
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn journal_autocommit(state: &Mutex<State>, sql: &str) {
    let mut state = lock(state);
    state.executed.push(sql.to_string());
    state.committed.push(sql.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn database() -> TestDatabase {
        let db = TestDatabase::new().await.unwrap();
        db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT UNIQUE)", &[])
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_inspection_helpers() {
        let db = database().await;
        db.execute("INSERT INTO users (name) VALUES (?), (?)", &["ada".into(), "alan".into()])
            .await
            .unwrap();

        assert!(db.table_exists("users").await.unwrap());
        assert!(!db.table_exists("posts").await.unwrap());
        assert_eq!(db.tables().await.unwrap(), vec!["users"]);
        assert_eq!(db.count("users").await.unwrap(), 2);
        assert_eq!(db.count("posts").await.unwrap(), 0);
        assert_eq!(db.column_values("users", "name").await.unwrap(), vec!["ada", "alan"]);
        assert_eq!(db.rows("users").await.unwrap()[1].get("id"), Some(&DatabaseValue::Int64(2)));
    }

    #[tokio::test]
    async fn test_rolled_back_writes_are_discarded() {
        let db = database().await;

        let mut tx = db.begin_transaction().await.unwrap();
        tx.execute("INSERT INTO users (name) VALUES ('ada')", &[]).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(db.count("users").await.unwrap(), 0);
        assert_eq!(db.rollback_count(), 1);
        assert!(db.executed_statements().iter().any(|s| s.contains("'ada'")));
        assert!(!db.committed_statements().iter().any(|s| s.contains("'ada'")));
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let db = database().await;

        let mut tx = db.begin_transaction().await.unwrap();
        tx.execute("INSERT INTO users (name) VALUES ('ada')", &[]).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.count("users").await.unwrap(), 1);
        assert_eq!(db.commit_count(), 1);
        assert!(db.committed_statements().iter().any(|s| s.contains("'ada'")));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let db = database().await;
        db.fail_statements_matching("insert into users").unwrap();

        let err = db.execute("INSERT INTO users (name) VALUES ('ada')", &[]).await.unwrap_err();
        assert!(err.to_string().contains("injected failure"));

        db.clear_failures();
        db.fail_commits(true);
        let mut tx = db.begin_transaction().await.unwrap();
        tx.execute("INSERT INTO users (name) VALUES ('ada')", &[]).await.unwrap();
        assert!(matches!(tx.commit().await, Err(DatabaseError::Transaction(_))));
        assert_eq!(db.count("users").await.unwrap(), 0);

        db.clear_failures();
        db.fail_begins(true);
        assert!(matches!(db.begin_transaction().await, Err(DatabaseError::Transaction(_))));

        assert!(db.fail_statements_matching("(unclosed").is_err());
    }

    #[tokio::test]
    async fn test_constraint_violations_surface_as_errors() {
        let db = database().await;
        db.execute("INSERT INTO users (name) VALUES ('ada')", &[]).await.unwrap();

        assert!(db.execute("INSERT INTO users (name) VALUES ('ada')", &[]).await.is_err());
        assert!(db.execute("SELEC nonsense", &[]).await.is_err());
        assert_eq!(db.count("users").await.unwrap(), 1);
    }
}
